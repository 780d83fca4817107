pub mod email;
pub mod slack;
pub mod telegram;
pub mod twilio;

use std::sync::Arc;

use chrono::Local;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use crate::{
    application::services::messenger::{Message, MessageComposer},
    domain::{
        errors::MessageError,
        models::{ChannelKind, MessageFields, MessagePart},
        repositories::ProfileRepository,
    },
};

pub use email::Email;
pub use slack::{SlackPost, SlackWebhook};
pub use telegram::TelegramBot;
pub use twilio::Twilio;

/// Provider base URLs; overridable to point adapters at a local server.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub telegram: String,
    pub slack: String,
    pub twilio: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            telegram: telegram::API_BASE.to_string(),
            slack: slack::API_BASE.to_string(),
            twilio: twilio::API_BASE.to_string(),
        }
    }
}

/// Maps a channel to its adapter, hydrating fields from saved profiles.
pub struct ChannelRegistry {
    profiles: Arc<dyn ProfileRepository>,
    http: Client,
    endpoints: Endpoints,
}

impl ChannelRegistry {
    pub fn new(profiles: Arc<dyn ProfileRepository>) -> Result<Self, MessageError> {
        let http = Client::builder()
            .user_agent(concat!("messages/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            profiles,
            http,
            endpoints: Endpoints::default(),
        })
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

impl MessageComposer for ChannelRegistry {
    fn compose(
        &self,
        channel: ChannelKind,
        fields: MessageFields,
    ) -> Result<Box<dyn Message>, MessageError> {
        let profiles = self.profiles.as_ref();
        let http = self.http.clone();
        let message: Box<dyn Message> = match channel {
            ChannelKind::Email => Box::new(Email::new(fields, profiles)?),
            ChannelKind::SlackWebhook => Box::new(SlackWebhook::new(fields, profiles, http)?),
            ChannelKind::SlackPost => Box::new(
                SlackPost::new(fields, profiles, http)?.with_base_url(&self.endpoints.slack),
            ),
            ChannelKind::Telegram => Box::new(
                TelegramBot::new(fields, profiles, http)?.with_base_url(&self.endpoints.telegram),
            ),
            ChannelKind::Twilio | ChannelKind::WhatsApp => Box::new(
                Twilio::new(channel, fields, profiles, http)?
                    .with_base_url(&self.endpoints.twilio),
            ),
        };
        Ok(message)
    }
}

/// Performs transmission calls for one message and reports their outcome.
///
/// Failures are logged (and printed in verbose mode), never returned to the
/// sender, so the remaining parts are still attempted.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Transmitter {
    channel: ChannelKind,
    verbose: bool,
}

impl Transmitter {
    pub(crate) fn new(channel: ChannelKind, verbose: bool) -> Self {
        Self { channel, verbose }
    }

    /// Issues the request; a non-success status becomes a transmission error
    /// carrying the response text.
    pub(crate) async fn transmit(
        &self,
        part: &MessagePart,
        request: RequestBuilder,
    ) -> Result<String, MessageError> {
        let response = request
            .send()
            .await
            .map_err(|err| self.failure(part, err))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(self.failure(part, format!("{status}: {text}")));
        }
        Ok(text)
    }

    pub(crate) fn report(&self, part: &MessagePart, outcome: Result<String, MessageError>) {
        match outcome {
            Ok(_) => {
                debug!(channel = %self.channel, %part, "sent");
                self.note(format!("{part} sent."));
            }
            Err(err) => {
                warn!(channel = %self.channel, %part, "{err}");
                self.note(format!("Error while sending {part}"));
                self.note(err.to_string());
            }
        }
    }

    pub(crate) fn failure(&self, part: &MessagePart, reason: impl ToString) -> MessageError {
        MessageError::Transmission {
            channel: self.channel,
            part: part.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Prints a timestamped progress line in verbose mode.
    pub(crate) fn note(&self, line: impl AsRef<str>) {
        if self.verbose {
            println!("{} {}", timestamp(), line.as_ref());
        }
    }

    pub(crate) fn summary(&self, message: &dyn std::fmt::Display) {
        if self.verbose {
            println!("{} {} info:{message:#}", timestamp(), self.channel);
        }
    }
}

/// Writes `Label: value` rows, one per line; the alternate form bullets them.
pub(crate) fn write_summary(
    f: &mut std::fmt::Formatter<'_>,
    rows: &[(&str, String)],
) -> std::fmt::Result {
    let separator = if f.alternate() { "\n * " } else { "\n" };
    for (label, value) in rows {
        write!(f, "{separator}{label}: {value}")?;
    }
    Ok(())
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Merges provider-specific parameters over a constructed payload.
pub(crate) fn merge_params(
    payload: &mut serde_json::Map<String, serde_json::Value>,
    params: &serde_json::Map<String, serde_json::Value>,
) {
    for (key, value) in params {
        payload.insert(key.clone(), value.clone());
    }
}

/// `From:`/`Subject:` header lines followed by the body.
pub(crate) fn compose_text(from: Option<&str>, subject: Option<&str>, body: &str) -> String {
    let mut text = String::new();
    if let Some(from) = from.filter(|value| !value.is_empty()) {
        text.push_str("From: ");
        text.push_str(from);
        text.push('\n');
    }
    if let Some(subject) = subject.filter(|value| !value.is_empty()) {
        text.push_str("Subject: ");
        text.push_str(subject);
        text.push('\n');
    }
    text.push_str(body);
    text
}
