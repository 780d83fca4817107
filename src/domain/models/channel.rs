use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::MessageError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    SlackWebhook,
    SlackPost,
    Telegram,
    Twilio,
    WhatsApp,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 6] = [
        ChannelKind::Email,
        ChannelKind::SlackWebhook,
        ChannelKind::SlackPost,
        ChannelKind::Telegram,
        ChannelKind::Twilio,
        ChannelKind::WhatsApp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::SlackWebhook => "slackwebhook",
            ChannelKind::SlackPost => "slackpost",
            ChannelKind::Telegram => "telegram",
            ChannelKind::Twilio => "twilio",
            ChannelKind::WhatsApp => "whatsapp",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email over SMTP",
            ChannelKind::SlackWebhook => "Slack incoming webhook",
            ChannelKind::SlackPost => "Slack chat.postMessage with a bot token",
            ChannelKind::Telegram => "Telegram Bot API",
            ChannelKind::Twilio => "SMS through Twilio",
            ChannelKind::WhatsApp => "WhatsApp through Twilio",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = MessageError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        ChannelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| MessageError::UnsupportedChannel(value.to_string()))
    }
}
