use secrecy::SecretString;

use crate::domain::{
    errors::MessageError, models::ChannelKind, repositories::ProfileRepository,
};

/// Fills absent adapter fields from one profile of one channel.
pub struct ProfileLookup<'a> {
    repo: &'a dyn ProfileRepository,
    channel: ChannelKind,
    profile: &'a str,
}

impl<'a> ProfileLookup<'a> {
    pub fn new(repo: &'a dyn ProfileRepository, channel: ChannelKind, profile: &'a str) -> Self {
        Self {
            repo,
            channel,
            profile,
        }
    }

    /// Explicit value if given, otherwise the saved one.
    pub fn value(&self, explicit: Option<String>, field: &str) -> Option<String> {
        explicit
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.repo.resolve(self.channel, self.profile, field))
    }

    pub fn required(&self, explicit: Option<String>, field: &str) -> Result<String, MessageError> {
        self.value(explicit, field)
            .ok_or_else(|| MessageError::missing(self.channel, field))
    }

    pub fn secret(
        &self,
        explicit: Option<SecretString>,
        field: &str,
    ) -> Result<SecretString, MessageError> {
        explicit
            .or_else(|| self.repo.resolve_secret(self.channel, self.profile, field))
            .ok_or_else(|| MessageError::missing(self.channel, field))
    }

    /// Explicit list if non-empty, otherwise a comma-separated saved value.
    pub fn list(&self, explicit: Vec<String>, field: &str) -> Vec<String> {
        if !explicit.is_empty() {
            return explicit;
        }
        self.repo
            .resolve(self.channel, self.profile, field)
            .map(|saved| {
                saved
                    .split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}
