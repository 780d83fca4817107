use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::info;

use super::{Transmitter, merge_params, write_summary};
use crate::{
    application::services::{
        messenger::{Deliver, Message},
        profiles::ProfileLookup,
    },
    domain::{
        errors::MessageError,
        models::{ChannelKind, MessageFields, MessagePart, preview},
        repositories::ProfileRepository,
    },
};

pub(crate) const API_BASE: &str = "https://api.twilio.com";

const WHATSAPP_PREFIX: &str = "whatsapp:";

/// SMS, or WhatsApp, message sent through the Twilio Messages API.
///
/// Media is delivered as one extra message per attachment URL.
pub struct Twilio {
    channel: ChannelKind,
    http: Client,
    base_url: String,
    account_sid: String,
    auth_token: SecretString,
    from: String,
    to: String,
    body: String,
    attachments: Vec<String>,
    params: Map<String, Value>,
    verbose: bool,
    message: Map<String, Value>,
}

impl Twilio {
    pub fn new(
        channel: ChannelKind,
        mut fields: MessageFields,
        profiles: &dyn ProfileRepository,
        http: Client,
    ) -> Result<Self, MessageError> {
        if !matches!(channel, ChannelKind::Twilio | ChannelKind::WhatsApp) {
            return Err(MessageError::UnsupportedChannel(channel.to_string()));
        }
        let profile = fields.profile().to_string();
        let lookup = ProfileLookup::new(profiles, channel, &profile);

        let auth_token = lookup.secret(fields.credentials.take(), "credentials")?;
        let account_sid = lookup.required(fields.take_param("account_sid"), "account_sid")?;
        let from = lookup.required(fields.from, "from")?;
        let to = match fields.to.as_slice() {
            [] => lookup.required(None, "to")?,
            [single] => single.clone(),
            _ => {
                return Err(MessageError::invalid(
                    channel,
                    "to",
                    "exactly one recipient number is accepted",
                ));
            }
        };

        Ok(Self {
            channel,
            http,
            base_url: API_BASE.to_string(),
            account_sid,
            auth_token,
            from: Self::address(channel, from),
            to: Self::address(channel, to),
            body: fields.body,
            attachments: fields.attachments,
            params: fields.params,
            verbose: fields.verbose,
            message: Map::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn address(channel: ChannelKind, number: String) -> String {
        if channel == ChannelKind::WhatsApp && !number.starts_with(WHATSAPP_PREFIX) {
            format!("{WHATSAPP_PREFIX}{number}")
        } else {
            number
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }

    /// Twilio takes form fields; non-string values are sent as their JSON text.
    fn form(payload: &Map<String, Value>) -> Vec<(String, String)> {
        payload
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let value = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    fn post(&self, payload: &Map<String, Value>) -> reqwest::RequestBuilder {
        self.http
            .post(self.url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&Self::form(payload))
    }
}

impl fmt::Display for Twilio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(
            f,
            &[
                ("From", self.from.clone()),
                ("To", self.to.clone()),
                ("Body", format!("{}...", preview(&self.body, 40))),
                ("Attachments", format!("{:?}", self.attachments)),
            ],
        )
    }
}

impl Message for Twilio {
    fn channel(&self) -> ChannelKind {
        self.channel
    }

    fn construct(&mut self) -> Result<(), MessageError> {
        self.message
            .insert("From".to_string(), Value::String(self.from.clone()));
        self.message
            .insert("To".to_string(), Value::String(self.to.clone()));
        self.message
            .insert("Body".to_string(), Value::String(self.body.clone()));
        merge_params(&mut self.message, &self.params);
        Ok(())
    }

    fn payload(&self) -> Value {
        if self.message.is_empty() {
            Value::Null
        } else {
            Value::Object(self.message.clone())
        }
    }

    fn into_deliverable(self: Box<Self>) -> Option<Box<dyn Deliver>> {
        Some(self)
    }
}

#[async_trait]
impl Deliver for Twilio {
    async fn send(&mut self) -> Result<(), MessageError> {
        let tx = Transmitter::new(self.channel, self.verbose);
        self.construct()?;
        tx.note("Message created.");

        let part = MessagePart::Body;
        tx.report(&part, tx.transmit(&part, self.post(&self.message)).await);

        for attachment in &self.attachments {
            let mut media = Map::new();
            media.insert("From".to_string(), Value::String(self.from.clone()));
            media.insert("To".to_string(), Value::String(self.to.clone()));
            media.insert("MediaUrl".to_string(), Value::String(attachment.clone()));
            let part = MessagePart::Attachment(attachment.clone());
            tx.report(&part, tx.transmit(&part, self.post(&media)).await);
        }

        tx.summary(&*self);
        info!(channel = %self.channel, attachments = self.attachments.len(), "message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::in_memory::InMemoryProfileRepository;

    fn profiles() -> InMemoryProfileRepository {
        InMemoryProfileRepository::new()
            .with(ChannelKind::Twilio, "default", "account_sid", "AC123")
            .with(ChannelKind::Twilio, "default", "credentials", "secret")
            .with(ChannelKind::Twilio, "default", "from", "+15550001")
            .with(ChannelKind::WhatsApp, "default", "account_sid", "AC123")
            .with(ChannelKind::WhatsApp, "default", "credentials", "secret")
            .with(ChannelKind::WhatsApp, "default", "from", "+15550001")
    }

    fn fields(to: &[&str]) -> MessageFields {
        MessageFields {
            to: to.iter().map(|n| n.to_string()).collect(),
            body: "Your code is 1234".into(),
            ..Default::default()
        }
    }

    #[test]
    fn sms_payload_uses_twilio_field_names() {
        let mut sms =
            Twilio::new(ChannelKind::Twilio, fields(&["+15550002"]), &profiles(), Client::new())
                .unwrap();
        sms.construct().unwrap();
        let payload = sms.payload();
        assert_eq!(payload["From"], "+15550001");
        assert_eq!(payload["To"], "+15550002");
        assert_eq!(payload["Body"], "Your code is 1234");
        assert!(sms.url().ends_with("/2010-04-01/Accounts/AC123/Messages.json"));
    }

    #[test]
    fn whatsapp_numbers_are_prefixed_once() {
        let mut wa = Twilio::new(
            ChannelKind::WhatsApp,
            fields(&["whatsapp:+15550002"]),
            &profiles(),
            Client::new(),
        )
        .unwrap();
        wa.construct().unwrap();
        assert_eq!(wa.payload()["From"], "whatsapp:+15550001");
        assert_eq!(wa.payload()["To"], "whatsapp:+15550002");
    }

    #[test]
    fn several_recipients_are_rejected() {
        let err = Twilio::new(
            ChannelKind::Twilio,
            fields(&["+1", "+2"]),
            &profiles(),
            Client::new(),
        )
        .err()
        .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn missing_account_sid_is_a_configuration_error() {
        let profiles = InMemoryProfileRepository::new()
            .with(ChannelKind::Twilio, "default", "credentials", "secret");
        let mut fields = fields(&["+15550002"]);
        fields.from = Some("+15550001".into());
        let err = Twilio::new(ChannelKind::Twilio, fields, &profiles, Client::new())
            .err()
            .unwrap();
        assert!(matches!(err, MessageError::Configuration { ref field, .. } if field == "account_sid"));
    }

    #[test]
    fn form_flattens_values() {
        let mut payload = Map::new();
        payload.insert("Body".into(), Value::from("hi"));
        payload.insert("ValidityPeriod".into(), Value::from(60));
        payload.insert("Skipped".into(), Value::Null);
        let form = Twilio::form(&payload);
        assert!(form.contains(&("Body".to_string(), "hi".to_string())));
        assert!(form.contains(&("ValidityPeriod".to_string(), "60".to_string())));
        assert_eq!(form.len(), 2);
    }
}
