use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::{models::ChannelKind, repositories::ProfileRepository};

type ProfileKey = (ChannelKind, String, String);

#[derive(Default, Clone)]
pub struct InMemoryProfileRepository {
    values: Arc<RwLock<HashMap<ProfileKey, String>>>,
}

impl InMemoryProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        channel: ChannelKind,
        profile: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        let mut values = self.values.write();
        values.insert((channel, profile.into(), field.into()), value.into());
    }

    pub fn with(
        self,
        channel: ChannelKind,
        profile: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.insert(channel, profile, field, value);
        self
    }
}

impl ProfileRepository for InMemoryProfileRepository {
    fn resolve(&self, channel: ChannelKind, profile: &str, field: &str) -> Option<String> {
        let values = self.values.read();
        values
            .get(&(channel, profile.to_string(), field.to_string()))
            .cloned()
    }
}
