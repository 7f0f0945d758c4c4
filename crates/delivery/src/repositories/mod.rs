//! Data access for conversations and the message ledger.

pub mod conversation_repository;
pub mod message_repository;

pub use conversation_repository::ConversationRepository;
pub use message_repository::MessageRepository;
