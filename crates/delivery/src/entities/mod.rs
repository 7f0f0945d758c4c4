//! Domain entities for message delivery.

pub mod conversation;
pub mod message;

pub use conversation::Conversation;
pub use message::{
    DeliveryEntry, DeliveryStatus, FileDescriptor, Message, MessageContent, SenderProfile,
    MAX_TEXT_LENGTH,
};
