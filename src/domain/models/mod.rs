pub mod channel;
pub mod message;

pub use channel::ChannelKind;
pub use message::{DEFAULT_PROFILE, MessageFields, MessagePart, preview};
