use serde_json::{Map, Value};
use secrecy::SecretString;

/// Provider-independent input for building any channel adapter.
///
/// Fields left empty are hydrated from the selected profile by the adapter.
#[derive(Debug, Clone, Default)]
pub struct MessageFields {
    pub from: Option<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: Option<String>,
    pub body: String,
    pub attachments: Vec<String>,
    /// Provider-specific extensions, merged into the outbound payload.
    pub params: Map<String, Value>,
    pub profile: Option<String>,
    pub credentials: Option<SecretString>,
    pub verbose: bool,
}

impl MessageFields {
    pub fn profile(&self) -> &str {
        self.profile.as_deref().unwrap_or(DEFAULT_PROFILE)
    }

    /// Removes a string-valued parameter, so that adapter settings do not leak
    /// into the provider payload.
    pub fn take_param(&mut self, key: &str) -> Option<String> {
        match self.params.remove(key)? {
            Value::String(value) => Some(value),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

pub const DEFAULT_PROFILE: &str = "default";

/// Which part of a message a transmission call carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Body,
    Attachment(String),
}

impl std::fmt::Display for MessagePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessagePart::Body => f.write_str("Message body"),
            MessagePart::Attachment(reference) => write!(f, "Attachment: {reference}"),
        }
    }
}

/// Shortens a body for summaries, respecting char boundaries.
pub fn preview(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}
