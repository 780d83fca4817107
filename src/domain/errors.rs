use thiserror::Error;

use super::models::ChannelKind;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("{channel}: missing required field '{field}'")]
    Configuration { channel: ChannelKind, field: String },
    #[error("{channel}: invalid value for '{field}': {reason}")]
    InvalidField {
        channel: ChannelKind,
        field: String,
        reason: String,
    },
    #[error("unsupported message type: '{0}'")]
    UnsupportedChannel(String),
    #[error("{channel}: error while sending {part}: {reason}")]
    Transmission {
        channel: ChannelKind,
        part: String,
        reason: String,
    },
    #[error("dispatch queue requires a running tokio runtime")]
    Runtime,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MessageError {
    pub fn missing(channel: ChannelKind, field: impl Into<String>) -> Self {
        MessageError::Configuration {
            channel,
            field: field.into(),
        }
    }

    pub fn invalid(channel: ChannelKind, field: impl Into<String>, reason: impl ToString) -> Self {
        MessageError::InvalidField {
            channel,
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// Configuration-class errors abort a send before any network call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MessageError::Configuration { .. } | MessageError::InvalidField { .. }
        )
    }
}
