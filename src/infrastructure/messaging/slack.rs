use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::info;

use super::{Transmitter, compose_text, merge_params, write_summary};
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

pub(crate) const API_BASE: &str = "https://slack.com/api";

/// Fields shared by both Slack adapters.
struct SlackContent {
    from: Option<String>,
    subject: Option<String>,
    body: String,
    attachments: Vec<String>,
    params: Map<String, Value>,
    verbose: bool,
}

impl SlackContent {
    fn new(fields: MessageFields, lookup: &ProfileLookup<'_>) -> Self {
        Self {
            from: lookup.value(fields.from, "from"),
            subject: fields.subject,
            body: fields.body,
            attachments: fields.attachments,
            params: fields.params,
            verbose: fields.verbose,
        }
    }

    fn text(&self) -> String {
        compose_text(self.from.as_deref(), self.subject.as_deref(), &self.body)
    }

    fn attachment(url: &str) -> Value {
        json!([{ "image_url": url, "fallback": url }])
    }

    fn rows(&self, to: String) -> Vec<(&'static str, String)> {
        vec![
            ("From", self.from.clone().unwrap_or_default()),
            ("To", to),
            ("Subject", self.subject.clone().unwrap_or_default()),
            ("Body", format!("{}...", preview(&self.body, 40))),
            ("Attachments", format!("{:?}", self.attachments)),
        ]
    }
}

/// Message posted to a Slack incoming webhook; the webhook URL is the
/// credential.
pub struct SlackWebhook {
    http: Client,
    url: SecretString,
    content: SlackContent,
    message: Map<String, Value>,
}

impl SlackWebhook {
    pub fn new(
        mut fields: MessageFields,
        profiles: &dyn ProfileRepository,
        http: Client,
    ) -> Result<Self, MessageError> {
        let profile = fields.profile().to_string();
        let lookup = ProfileLookup::new(profiles, ChannelKind::SlackWebhook, &profile);
        let url = lookup.secret(fields.credentials.take(), "credentials")?;
        if !url.expose_secret().starts_with("http") {
            return Err(MessageError::invalid(
                ChannelKind::SlackWebhook,
                "credentials",
                "webhook URL must start with http(s)://",
            ));
        }

        Ok(Self {
            http,
            url,
            content: SlackContent::new(fields, &lookup),
            message: Map::new(),
        })
    }
}

impl fmt::Display for SlackWebhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(f, &self.content.rows("***webhook***".to_string()))
    }
}

impl Message for SlackWebhook {
    fn channel(&self) -> ChannelKind {
        ChannelKind::SlackWebhook
    }

    fn construct(&mut self) -> Result<(), MessageError> {
        self.message
            .insert("text".to_string(), Value::String(self.content.text()));
        merge_params(&mut self.message, &self.content.params);
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
impl Deliver for SlackWebhook {
    async fn send(&mut self) -> Result<(), MessageError> {
        let tx = Transmitter::new(ChannelKind::SlackWebhook, self.content.verbose);
        self.construct()?;
        tx.note("Message created.");

        let part = MessagePart::Body;
        let request = self.http.post(self.url.expose_secret()).json(&self.message);
        tx.report(&part, tx.transmit(&part, request).await);

        for attachment in &self.content.attachments {
            let body = json!({ "attachments": SlackContent::attachment(attachment) });
            let part = MessagePart::Attachment(attachment.clone());
            let request = self.http.post(self.url.expose_secret()).json(&body);
            tx.report(&part, tx.transmit(&part, request).await);
        }

        tx.summary(&*self);
        info!(
            channel = "slackwebhook",
            attachments = self.content.attachments.len(),
            "message sent"
        );
        Ok(())
    }
}

/// Message posted with `chat.postMessage` using a bot token.
pub struct SlackPost {
    http: Client,
    base_url: String,
    token: SecretString,
    channel: String,
    content: SlackContent,
    message: Map<String, Value>,
}

impl SlackPost {
    pub fn new(
        mut fields: MessageFields,
        profiles: &dyn ProfileRepository,
        http: Client,
    ) -> Result<Self, MessageError> {
        let profile = fields.profile().to_string();
        let lookup = ProfileLookup::new(profiles, ChannelKind::SlackPost, &profile);
        let token = lookup.secret(fields.credentials.take(), "credentials")?;
        let channel = lookup.required(fields.to.first().cloned(), "to")?;

        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            token,
            channel,
            content: SlackContent::new(fields, &lookup),
            message: Map::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn post(&self, body: &Value) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .json(body)
    }

    /// Slack reports API errors in a 200 response with `"ok": false`.
    fn check(text: String) -> Result<String, String> {
        match serde_json::from_str::<SlackApiResponse>(&text) {
            Ok(SlackApiResponse { ok: false, error }) => {
                Err(error.unwrap_or_else(|| "unknown error".to_string()))
            }
            _ => Ok(text),
        }
    }

    async fn transmit(&self, tx: &Transmitter, part: &MessagePart, body: &Value) {
        let outcome = tx
            .transmit(part, self.post(body))
            .await
            .and_then(|text| Self::check(text).map_err(|reason| tx.failure(part, reason)));
        tx.report(part, outcome);
    }
}

impl fmt::Display for SlackPost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(f, &self.content.rows(self.channel.clone()))
    }
}

impl Message for SlackPost {
    fn channel(&self) -> ChannelKind {
        ChannelKind::SlackPost
    }

    fn construct(&mut self) -> Result<(), MessageError> {
        self.message
            .insert("channel".to_string(), Value::String(self.channel.clone()));
        self.message
            .insert("text".to_string(), Value::String(self.content.text()));
        merge_params(&mut self.message, &self.content.params);
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
impl Deliver for SlackPost {
    async fn send(&mut self) -> Result<(), MessageError> {
        let tx = Transmitter::new(ChannelKind::SlackPost, self.content.verbose);
        self.construct()?;
        tx.note("Message created.");

        let body = Value::Object(self.message.clone());
        self.transmit(&tx, &MessagePart::Body, &body).await;

        for attachment in &self.content.attachments {
            let body = json!({
                "channel": self.channel,
                "attachments": SlackContent::attachment(attachment),
            });
            self.transmit(&tx, &MessagePart::Attachment(attachment.clone()), &body)
                .await;
        }

        tx.summary(&*self);
        info!(
            channel = "slackpost",
            attachments = self.content.attachments.len(),
            "message sent"
        );
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}
