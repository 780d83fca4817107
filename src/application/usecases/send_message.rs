use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::{
    application::{
        handlers::dispatch_queue::DispatchQueue,
        services::messenger::{Draft, Message, MessageComposer},
    },
    domain::{
        errors::MessageError,
        models::{ChannelKind, MessageFields},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Send on the caller's task and return once every call was attempted.
    Immediate,
    /// Hand the message to the dispatch queue and return right away.
    Queued,
}

pub struct SendMessageRequest {
    pub channel: String,
    pub fields: MessageFields,
    pub delivery: Delivery,
    pub dry_run: bool,
}

#[derive(Debug)]
pub enum SendMessageResponse {
    Sent,
    Queued,
    Previewed { summary: String, payload: Value },
}

pub struct SendMessageUseCase {
    composer: Arc<dyn MessageComposer>,
    queue: Arc<DispatchQueue>,
}

impl SendMessageUseCase {
    pub fn new(composer: Arc<dyn MessageComposer>, queue: Arc<DispatchQueue>) -> Self {
        Self { composer, queue }
    }

    pub async fn execute(
        &self,
        request: SendMessageRequest,
    ) -> Result<SendMessageResponse, MessageError> {
        let channel: ChannelKind = request.channel.parse()?;
        let message = self.composer.compose(channel, request.fields)?;

        if request.dry_run {
            let mut draft = Draft::new(message);
            draft.construct()?;
            return Ok(SendMessageResponse::Previewed {
                summary: format!("{draft:#}"),
                payload: draft.payload(),
            });
        }

        match request.delivery {
            Delivery::Queued => {
                self.queue.enqueue(message);
                info!(%channel, "message queued");
                Ok(SendMessageResponse::Queued)
            }
            Delivery::Immediate => match message.into_deliverable() {
                Some(mut deliverable) => {
                    deliverable.send().await?;
                    Ok(SendMessageResponse::Sent)
                }
                None => Err(MessageError::UnsupportedChannel(channel.to_string())),
            },
        }
    }
}
