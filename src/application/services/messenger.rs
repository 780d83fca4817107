use std::fmt;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{
    errors::MessageError,
    models::{ChannelKind, MessageFields},
};

/// A composed message for one channel.
///
/// Every adapter can build its provider payload; only those that also
/// implement [`Deliver`] can be handed to the dispatch queue or sent.
pub trait Message: fmt::Display + Send {
    fn channel(&self) -> ChannelKind;

    /// Builds the provider payload from the adapter's fields.
    fn construct(&mut self) -> Result<(), MessageError>;

    /// Snapshot of the payload built by the last [`Message::construct`] call,
    /// `Value::Null` before that.
    fn payload(&self) -> Value;

    /// Send capability, if this message has one.
    fn into_deliverable(self: Box<Self>) -> Option<Box<dyn Deliver>>;
}

#[async_trait]
pub trait Deliver: Message {
    /// Constructs the payload and transmits body and attachments.
    ///
    /// Only construction failures are returned; transmission failures are
    /// reported through logging and verbose output.
    async fn send(&mut self) -> Result<(), MessageError>;
}

/// A message with its send capability withheld, used for dry runs.
pub struct Draft {
    inner: Box<dyn Message>,
}

impl Draft {
    pub fn new(inner: Box<dyn Message>) -> Self {
        Self { inner }
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "[draft] {:#}", self.inner)
        } else {
            write!(f, "[draft] {}", self.inner)
        }
    }
}

impl Message for Draft {
    fn channel(&self) -> ChannelKind {
        self.inner.channel()
    }

    fn construct(&mut self) -> Result<(), MessageError> {
        self.inner.construct()
    }

    fn payload(&self) -> Value {
        self.inner.payload()
    }

    fn into_deliverable(self: Box<Self>) -> Option<Box<dyn Deliver>> {
        None
    }
}

/// Builds the adapter for a channel from generic fields.
pub trait MessageComposer: Send + Sync {
    fn compose(
        &self,
        channel: ChannelKind,
        fields: MessageFields,
    ) -> Result<Box<dyn Message>, MessageError>;
}
