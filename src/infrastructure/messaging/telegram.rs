use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

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

pub(crate) const API_BASE: &str = "https://api.telegram.org";

/// Message sent through the Telegram Bot API.
///
/// The recipient must have started a chat with the bot. When only a
/// username is known, the chat id is looked up in the bot's recent updates,
/// which Telegram keeps for about 24 hours; a miss leaves the id empty.
pub struct TelegramBot {
    http: Client,
    base_url: String,
    bot_token: SecretString,
    from: Option<String>,
    to: Option<String>,
    chat_id: Option<String>,
    subject: Option<String>,
    body: String,
    attachments: Vec<String>,
    params: Map<String, Value>,
    verbose: bool,
    message: Map<String, Value>,
}

impl TelegramBot {
    pub fn new(
        mut fields: MessageFields,
        profiles: &dyn ProfileRepository,
        http: Client,
    ) -> Result<Self, MessageError> {
        let channel = ChannelKind::Telegram;
        let profile = fields.profile().to_string();
        let lookup = ProfileLookup::new(profiles, channel, &profile);

        let bot_token = lookup.secret(fields.credentials.take(), "credentials")?;
        let chat_id = lookup.value(fields.take_param("chat_id"), "chat_id");
        let to = fields.to.first().cloned();
        if chat_id.is_none() && to.is_none() {
            return Err(MessageError::missing(channel, "chat_id"));
        }

        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            bot_token,
            from: lookup.value(fields.from, "from"),
            to,
            chat_id,
            subject: fields.subject,
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

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref()
    }

    fn build_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url,
            self.bot_token.expose_secret(),
            method
        )
    }

    /// Finds the chat id of `username` among the bot's pending updates.
    pub async fn lookup_chat_id(&self, username: &str) -> Option<String> {
        let user = username.rsplit('@').next().unwrap_or(username);
        let response = match self.http.get(self.build_url("getUpdates")).send().await {
            Ok(response) => response,
            Err(err) => {
                warn!(channel = "telegram", "chat id lookup failed: {err}");
                return None;
            }
        };
        let updates: TelegramUpdatesResponse = match response.json().await {
            Ok(updates) => updates,
            Err(err) => {
                warn!(channel = "telegram", "unreadable getUpdates response: {err}");
                return None;
            }
        };
        if !updates.ok {
            warn!(
                channel = "telegram",
                "getUpdates returned error: {}",
                updates.description.unwrap_or_else(|| "unknown error".to_string())
            );
            return None;
        }

        updates
            .result
            .into_iter()
            .filter_map(|update| update.message?.from)
            .find(|sender| {
                sender
                    .username
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(user))
            })
            .map(|sender| sender.id.to_string())
    }
}

impl fmt::Display for TelegramBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_summary(
            f,
            &[
                ("From", self.from.clone().unwrap_or_default()),
                ("To", self.to.clone().unwrap_or_default()),
                ("Chat ID", self.chat_id.clone().unwrap_or_default()),
                ("Subject", self.subject.clone().unwrap_or_default()),
                ("Body", format!("{}...", preview(&self.body, 40))),
                ("Attachments", format!("{:?}", self.attachments)),
            ],
        )
    }
}

impl Message for TelegramBot {
    fn channel(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    fn construct(&mut self) -> Result<(), MessageError> {
        self.message
            .insert("chat_id".to_string(), chat_id_value(self.chat_id.as_deref()));
        self.message.insert(
            "text".to_string(),
            Value::String(compose_text(
                self.from.as_deref(),
                self.subject.as_deref(),
                &self.body,
            )),
        );
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
impl Deliver for TelegramBot {
    async fn send(&mut self) -> Result<(), MessageError> {
        let tx = Transmitter::new(ChannelKind::Telegram, self.verbose);

        if self.chat_id.is_none() {
            if let Some(username) = self.to.clone() {
                self.chat_id = self.lookup_chat_id(&username).await;
                if self.chat_id.is_none() {
                    debug!(channel = "telegram", %username, "no chat id found for username");
                }
            }
        }

        self.construct()?;
        tx.note("Message created.");

        let part = MessagePart::Body;
        let request = self.http.post(self.build_url("sendMessage")).json(&self.message);
        tx.report(&part, tx.transmit(&part, request).await);

        for attachment in self.attachments.clone() {
            self.message
                .insert("document".to_string(), Value::String(attachment.clone()));
            let part = MessagePart::Attachment(attachment);
            let request = self.http.post(self.build_url("sendDocument")).json(&self.message);
            tx.report(&part, tx.transmit(&part, request).await);
        }

        tx.summary(&*self);
        info!(channel = "telegram", attachments = self.attachments.len(), "message sent");
        Ok(())
    }
}

/// Numeric ids are sent as numbers; `@channel` names stay strings.
fn chat_id_value(chat_id: Option<&str>) -> Value {
    match chat_id {
        None => Value::Null,
        Some(id) => id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(id.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct TelegramUpdatesResponse {
    ok: bool,
    description: Option<String>,
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    from: Option<TelegramUser>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    username: Option<String>,
}
