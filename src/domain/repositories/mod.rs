use secrecy::SecretString;

use crate::domain::models::ChannelKind;

/// Read-only access to saved profile values.
///
/// Storage is owned elsewhere; adapters only ask for the fields they are
/// missing.
pub trait ProfileRepository: Send + Sync {
    fn resolve(&self, channel: ChannelKind, profile: &str, field: &str) -> Option<String>;

    fn resolve_secret(&self, channel: ChannelKind, profile: &str, field: &str) -> Option<SecretString> {
        self.resolve(channel, profile, field).map(SecretString::from)
    }
}

/// A repository that knows nothing; every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProfiles;

impl ProfileRepository for NoProfiles {
    fn resolve(&self, _channel: ChannelKind, _profile: &str, _field: &str) -> Option<String> {
        None
    }
}
