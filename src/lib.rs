//! Compose messages once and send them through email, Slack, Telegram,
//! Twilio SMS or WhatsApp, either directly or through an in-memory
//! dispatch queue that never blocks the caller.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use application::{
    handlers::dispatch_queue::{DispatchQueue, ShutdownPolicy},
    services::messenger::{Deliver, Draft, Message, MessageComposer},
    usecases::send_message::{Delivery, SendMessageRequest, SendMessageResponse, SendMessageUseCase},
};
pub use domain::{
    errors::MessageError,
    models::{ChannelKind, MessageFields},
    repositories::ProfileRepository,
};
pub use infrastructure::messaging::{ChannelRegistry, Endpoints};
