//! Error types for the delivery system.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for ledger and orchestration operations
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Errors that abort a read or a send.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conversation not found: {id}")]
    ConversationNotFound { id: String },

    #[error("Message not found: {id}")]
    MessageNotFound { id: String },

    #[error("No delivery entry for recipient {recipient_id} on message {message_id}")]
    DeliveryEntryNotFound { message_id: i64, recipient_id: i64 },

    #[error("Access denied: {reason}")]
    Forbidden { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl DeliveryError {
    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        Self::ConversationNotFound { id: id.into() }
    }

    pub fn message_not_found(id: impl ToString) -> Self {
        Self::MessageNotFound { id: id.to_string() }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for every variant that maps to a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound { .. }
                | Self::MessageNotFound { .. }
                | Self::DeliveryEntryNotFound { .. }
        )
    }
}

/// A push to one connection failed. Never fatal to a send.
#[derive(Debug, Error)]
pub enum PushError {
    #[error("connection {connection_id} is closed")]
    Closed { connection_id: u64 },

    #[error("outbound queue of connection {connection_id} is full")]
    Full { connection_id: u64 },

    #[error("push timed out after {0:?}")]
    TimedOut(Duration),
}

/// Analytics publishing failed. Logged at the call site and dropped.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("publish timed out after {0:?}")]
    TimedOut(Duration),

    #[error("publisher unavailable: {0}")]
    Unavailable(String),
}
