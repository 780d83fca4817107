use std::collections::HashMap;

use crate::domain::{
    models::{ChannelKind, DEFAULT_PROFILE},
    repositories::ProfileRepository,
};

const PREFIX: &str = "MESSAGES";

/// Profile values read from environment variables.
///
/// `MESSAGES_<CHANNEL>_<PROFILE>_<FIELD>`; the `default` profile also
/// accepts `MESSAGES_<CHANNEL>_<FIELD>`.
pub struct EnvProfileRepository {
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl EnvProfileRepository {
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self::with_lookup(move |key| vars.get(key).cloned())
    }

    fn key(parts: &[&str]) -> String {
        let mut key = PREFIX.to_string();
        for part in parts {
            key.push('_');
            key.extend(
                part.chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' }),
            );
        }
        key
    }
}

impl Default for EnvProfileRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileRepository for EnvProfileRepository {
    fn resolve(&self, channel: ChannelKind, profile: &str, field: &str) -> Option<String> {
        let scoped = Self::key(&[channel.as_str(), profile, field]);
        (self.lookup)(&scoped)
            .or_else(|| {
                (profile == DEFAULT_PROFILE)
                    .then(|| (self.lookup)(&Self::key(&[channel.as_str(), field])))
                    .flatten()
            })
            .filter(|value| !value.is_empty())
    }
}
