//! # Herald Delivery Crate
//!
//! Core of the Herald backend: authorizes a sender against a conversation,
//! records the message together with one delivery entry per recipient, pushes
//! it to recipients that currently hold a live connection and folds the
//! per-recipient outcomes back into the message's aggregate status.
//!
//! ## Architecture
//!
//! - **Entities**: `Conversation`, `Message`, `DeliveryEntry`
//! - **Repositories**: SQL access for conversations and the message ledger
//! - **Services**: authorization gate, presence directory, pusher, analytics
//!   publisher and the `DeliveryService` that composes them
//! - **Types**: errors and the websocket event envelope
//!
//! ## Usage
//!
//! ```rust,ignore
//! use herald_delivery::{DeliveryService, MessageContent};
//!
//! let message = service
//!     .send(&conversation_id, sender_id, MessageContent::text("hi"))
//!     .await?;
//! ```

pub mod entities;
pub mod repositories;
pub mod services;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_utils;

pub use entities::{
    Conversation, DeliveryEntry, DeliveryStatus, FileDescriptor, Message, MessageContent,
    SenderProfile, MAX_TEXT_LENGTH,
};
pub use repositories::{ConversationRepository, MessageRepository};
pub use services::{
    AuthorizationGate, ChannelPusher, ConnectionHandle, ConnectionRegistry, DeliveryService,
    DeliverySettings, DisabledPublisher, EventPublisher, MessageEvent, PresenceDirectory, Pusher,
    RedisStreamPublisher,
};
pub use types::{DeliveryError, DeliveryResult, PublishError, PushError, ServerEvent};
