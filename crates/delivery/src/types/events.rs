//! Events written to a client's websocket.

use serde::Serialize;

use crate::entities::Message;

/// Envelope sent over a live connection, tagged by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// First frame on every connection, once it is registered for pushes.
    Hello {
        version: String,
        user_id: String,
        connection_id: u64,
    },

    /// A message was sent to a conversation the receiver participates in.
    NewMessage { message: Message },

    Error { message: String },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Hello { .. } => "hello",
            ServerEvent::NewMessage { .. } => "new_message",
            ServerEvent::Error { .. } => "error",
        }
    }
}
