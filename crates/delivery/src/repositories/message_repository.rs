//! The message ledger: messages plus one delivery row per recipient.
//!
//! Delivery rows are only ever touched one at a time, keyed by
//! `(message_id, recipient_id)`, so concurrent fan-out work never rewrites a
//! sibling entry. The aggregate on `messages.status` is derived from those rows.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::entities::{
    Conversation, DeliveryEntry, DeliveryStatus, FileDescriptor, Message, MessageContent,
    SenderProfile,
};
use crate::types::{DeliveryError, DeliveryResult};
use crate::utils::{format_timestamp, new_public_id, now_timestamp};

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.public_id, c.public_id AS conversation_public_id, m.sender_id,
           u.public_id AS sender_public_id, u.display_name AS sender_display_name,
           u.avatar_url AS sender_avatar_url, m.text, m.image_url, m.file_url,
           m.file_name, m.file_size, m.file_type, m.file_storage, m.status, m.created_at
    FROM messages m
    JOIN conversations c ON c.id = m.conversation_id
    JOIN users u ON u.id = m.sender_id
"#;

const DELIVERY_SELECT: &str = r#"
    SELECT d.message_id, d.recipient_id, u.public_id AS recipient_public_id,
           d.status, d.delivered_at
    FROM message_deliveries d
    JOIN users u ON u.id = d.recipient_id
"#;

#[derive(Debug, FromRow)]
struct MessageRow {
    id: i64,
    public_id: String,
    conversation_public_id: String,
    sender_id: i64,
    sender_public_id: String,
    sender_display_name: Option<String>,
    sender_avatar_url: Option<String>,
    text: Option<String>,
    image_url: Option<String>,
    file_url: Option<String>,
    file_name: Option<String>,
    file_size: Option<i64>,
    file_type: Option<String>,
    file_storage: Option<String>,
    status: String,
    created_at: String,
}

#[derive(Debug, FromRow)]
struct DeliveryRow {
    message_id: i64,
    recipient_id: i64,
    recipient_public_id: String,
    status: String,
    delivered_at: Option<String>,
}

impl DeliveryRow {
    fn into_entry(self) -> DeliveryResult<DeliveryEntry> {
        Ok(DeliveryEntry {
            recipient_id: self.recipient_id,
            recipient_public_id: self.recipient_public_id,
            status: self.status.parse()?,
            delivered_at: self.delivered_at,
        })
    }
}

impl MessageRow {
    fn into_message(self, deliveries: Vec<DeliveryEntry>) -> DeliveryResult<Message> {
        let file = self.file_url.map(|url| FileDescriptor {
            url,
            name: self.file_name,
            size: self.file_size,
            file_type: self.file_type,
            storage: self.file_storage,
        });

        Ok(Message {
            id: self.id,
            public_id: self.public_id,
            conversation_id: self.conversation_public_id,
            sender_id: self.sender_id,
            sender: SenderProfile {
                id: self.sender_public_id,
                display_name: self.sender_display_name,
                avatar_url: self.sender_avatar_url,
            },
            text: self.text,
            image: self.image_url,
            file,
            status: self.status.parse()?,
            deliveries,
            created_at: self.created_at,
        })
    }
}

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records a message and a `sent` entry for each distinct recipient in one
    /// transaction, then returns it with sender identity attached.
    pub async fn create(
        &self,
        conversation: &Conversation,
        sender_id: i64,
        content: &MessageContent,
        recipients: &[i64],
    ) -> DeliveryResult<Message> {
        let public_id = new_public_id();
        let now = now_timestamp();
        let file = content.file.as_ref();

        let mut tx = self.pool.begin().await?;

        let message_id = sqlx::query(
            r#"
            INSERT INTO messages (public_id, conversation_id, sender_id, text, image_url,
                                  file_url, file_name, file_size, file_type, file_storage,
                                  status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&public_id)
        .bind(conversation.id)
        .bind(sender_id)
        .bind(content.text.as_deref())
        .bind(content.image.as_deref())
        .bind(file.map(|file| file.url.as_str()))
        .bind(file.and_then(|file| file.name.as_deref()))
        .bind(file.and_then(|file| file.size))
        .bind(file.and_then(|file| file.file_type.as_deref()))
        .bind(file.and_then(|file| file.storage.as_deref()))
        .bind(DeliveryStatus::Sent.as_str())
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let mut seen = HashSet::new();
        let unique = recipients.iter().copied().filter(|id| seen.insert(*id));

        for (position, recipient_id) in unique.enumerate() {
            sqlx::query(
                r#"
                INSERT INTO message_deliveries (message_id, recipient_id, position, status, delivered_at)
                VALUES (?, ?, ?, ?, NULL)
                "#,
            )
            .bind(message_id)
            .bind(recipient_id)
            .bind(position as i64)
            .bind(DeliveryStatus::Sent.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(message_id, recipients = seen.len(), "message recorded");

        self.find_by_id(message_id)
            .await?
            .ok_or_else(|| DeliveryError::internal("Failed to fetch created message"))
    }

    /// Flips one recipient's entry to `delivered`. An existing timestamp is
    /// kept, so repeating the call is harmless.
    pub async fn mark_delivered(
        &self,
        message_id: i64,
        recipient_id: i64,
        at: DateTime<Utc>,
    ) -> DeliveryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE message_deliveries
            SET status = ?, delivered_at = COALESCE(delivered_at, ?)
            WHERE message_id = ? AND recipient_id = ?
            "#,
        )
        .bind(DeliveryStatus::Delivered.as_str())
        .bind(format_timestamp(at))
        .bind(message_id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            if !self.exists(message_id).await? {
                return Err(DeliveryError::message_not_found(message_id));
            }
            return Err(DeliveryError::DeliveryEntryNotFound {
                message_id,
                recipient_id,
            });
        }

        Ok(())
    }

    /// Re-derives `messages.status` from the delivery rows and writes it back
    /// only when it changed.
    pub async fn recompute_aggregate_status(&self, message_id: i64) -> DeliveryResult<DeliveryStatus> {
        let stored: Option<String> = sqlx::query_scalar("SELECT status FROM messages WHERE id = ?")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        let stored: DeliveryStatus = stored
            .ok_or_else(|| DeliveryError::message_not_found(message_id))?
            .parse()?;

        let entries: Vec<String> = sqlx::query_scalar(
            "SELECT status FROM message_deliveries WHERE message_id = ? ORDER BY position ASC",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        let entries = entries
            .iter()
            .map(|status| status.parse::<DeliveryStatus>())
            .collect::<DeliveryResult<Vec<_>>>()?;
        let derived = DeliveryStatus::aggregate(entries);

        if derived != stored {
            sqlx::query("UPDATE messages SET status = ? WHERE id = ?")
                .bind(derived.as_str())
                .bind(message_id)
                .execute(&self.pool)
                .await?;
            debug!(message_id, from = %stored, to = %derived, "aggregate status changed");
        }

        Ok(derived)
    }

    pub async fn find_by_id(&self, message_id: i64) -> DeliveryResult<Option<Message>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!("{MESSAGE_SELECT} WHERE m.id = ?"))
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let deliveries = sqlx::query_as::<_, DeliveryRow>(&format!(
            "{DELIVERY_SELECT} WHERE d.message_id = ? ORDER BY d.position ASC"
        ))
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(DeliveryRow::into_entry)
        .collect::<DeliveryResult<Vec<_>>>()?;

        row.into_message(deliveries).map(Some)
    }

    /// Every message of a conversation in creation order, ties broken by id.
    pub async fn list_by_conversation(&self, conversation_id: i64) -> DeliveryResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "{MESSAGE_SELECT} WHERE m.conversation_id = ? ORDER BY m.created_at ASC, m.id ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        let delivery_rows = sqlx::query_as::<_, DeliveryRow>(&format!(
            "{DELIVERY_SELECT} JOIN messages m ON m.id = d.message_id \
             WHERE m.conversation_id = ? ORDER BY d.message_id ASC, d.position ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_message: HashMap<i64, Vec<DeliveryEntry>> = HashMap::new();
        for row in delivery_rows {
            let message_id = row.message_id;
            by_message
                .entry(message_id)
                .or_default()
                .push(row.into_entry()?);
        }

        rows.into_iter()
            .map(|row| {
                let deliveries = by_message.remove(&row.id).unwrap_or_default();
                row.into_message(deliveries)
            })
            .collect()
    }

    async fn exists(&self, message_id: i64) -> DeliveryResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM messages WHERE id = ?")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}
