//! Best-effort analytics: one stream record per sent message.

use async_trait::async_trait;
use herald_config::RedisConfig;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::entities::Message;
use crate::types::PublishError;

/// Coarse description of a send, with no message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub message_id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub timestamp: String,
    pub has_image: bool,
    pub has_file: bool,
    /// MIME type of the attached file, `"none"` without one
    pub file_type: String,
}

impl MessageEvent {
    pub fn from_message(message: &Message) -> Self {
        let file_type = message
            .file
            .as_ref()
            .and_then(|file| file.file_type.clone())
            .unwrap_or_else(|| "none".to_string());

        Self {
            message_id: message.public_id.clone(),
            conversation_id: message.conversation_id.clone(),
            sender_id: message.sender.id.clone(),
            timestamp: message.created_at.clone(),
            has_image: message.has_image(),
            has_file: message.has_file(),
            file_type,
        }
    }

    /// Stream field/value pairs in their wire order.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("messageId", self.message_id.clone()),
            ("conversationId", self.conversation_id.clone()),
            ("senderId", self.sender_id.clone()),
            ("timestamp", self.timestamp.clone()),
            ("hasImage", flag(self.has_image)),
            ("hasFile", flag(self.has_file)),
            ("fileType", self.file_type.clone()),
        ]
    }
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &MessageEvent) -> Result<(), PublishError>;
}

/// Appends events to a capped Redis stream with `XADD`.
#[derive(Clone)]
pub struct RedisStreamPublisher {
    connection: ConnectionManager,
    stream_key: String,
    max_len: u64,
}

impl RedisStreamPublisher {
    pub fn new(connection: ConnectionManager, config: &RedisConfig) -> Self {
        Self {
            connection,
            stream_key: config.stream_key.clone(),
            max_len: config.stream_max_len,
        }
    }

    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }
}

/// `XADD <key> MAXLEN ~ <n> * field value ...`
fn xadd_command(stream_key: &str, max_len: u64, event: &MessageEvent) -> redis::Cmd {
    let mut cmd = redis::cmd("XADD");
    cmd.arg(stream_key).arg("MAXLEN").arg("~").arg(max_len).arg("*");
    for (field, value) in event.fields() {
        cmd.arg(field).arg(value);
    }
    cmd
}

#[async_trait]
impl EventPublisher for RedisStreamPublisher {
    async fn publish(&self, event: &MessageEvent) -> Result<(), PublishError> {
        let mut connection = self.connection.clone();
        let entry_id: String = xadd_command(&self.stream_key, self.max_len, event)
            .query_async(&mut connection)
            .await?;

        debug!(
            stream = %self.stream_key,
            entry_id = %entry_id,
            message_id = %event.message_id,
            "message event published"
        );
        Ok(())
    }
}

/// Used when no Redis URL is configured or Redis could not be reached at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPublisher;

#[async_trait]
impl EventPublisher for DisabledPublisher {
    async fn publish(&self, event: &MessageEvent) -> Result<(), PublishError> {
        debug!(message_id = %event.message_id, "analytics disabled, dropping message event");
        Ok(())
    }
}
