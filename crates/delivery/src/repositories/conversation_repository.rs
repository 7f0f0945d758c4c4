//! Repository for conversation membership and last-message bookkeeping.

use sqlx::{FromRow, SqlitePool};

use crate::entities::Conversation;
use crate::types::{DeliveryError, DeliveryResult};
use crate::utils::{new_public_id, now_timestamp};

#[derive(Debug, FromRow)]
struct ConversationRow {
    id: i64,
    public_id: String,
    last_message_id: Option<i64>,
    updated_at: String,
}

#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DeliveryResult<Option<Conversation>> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, public_id, last_message_id, updated_at
            FROM conversations
            WHERE public_id = ?
            "#,
        )
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_participants(row).await?)),
            None => Ok(None),
        }
    }

    /// All conversations, oldest first.
    pub async fn list_all(&self) -> DeliveryResult<Vec<Conversation>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, public_id, last_message_id, updated_at
            FROM conversations
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut conversations = Vec::with_capacity(rows.len());
        for row in rows {
            conversations.push(self.with_participants(row).await?);
        }
        Ok(conversations)
    }

    /// Inserts a conversation with its participants. Used by seeding and tests;
    /// membership management itself is owned elsewhere.
    pub async fn create(
        &self,
        title: Option<&str>,
        participants: &[i64],
    ) -> DeliveryResult<Conversation> {
        let public_id = new_public_id();
        let now = now_timestamp();
        let mut tx = self.pool.begin().await?;

        let conversation_id = sqlx::query(
            r#"
            INSERT INTO conversations (public_id, title, is_group, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&public_id)
        .bind(title)
        .bind(participants.len() > 2)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for user_id in participants {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO conversation_participants (conversation_id, user_id, joined_at)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(conversation_id)
            .bind(user_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.find_by_public_id(&public_id)
            .await?
            .ok_or_else(|| DeliveryError::internal("Failed to fetch created conversation"))
    }

    /// Points the conversation at its newest message.
    ///
    /// The reference only moves forward, so a send that finishes late cannot
    /// pull it back to an older message.
    pub async fn touch_last_message(
        &self,
        conversation_id: i64,
        message_id: i64,
        at: &str,
    ) -> DeliveryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_id = ?, updated_at = ?
            WHERE id = ? AND (last_message_id IS NULL OR last_message_id < ?)
            "#,
        )
        .bind(message_id)
        .bind(at)
        .bind(conversation_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT id FROM conversations WHERE id = ?")
                    .bind(conversation_id)
                    .fetch_optional(&self.pool)
                    .await?;
            if exists.is_none() {
                return Err(DeliveryError::conversation_not_found(
                    conversation_id.to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn with_participants(&self, row: ConversationRow) -> DeliveryResult<Conversation> {
        let participants: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM conversation_participants
            WHERE conversation_id = ?
            ORDER BY joined_at ASC, id ASC
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Conversation {
            id: row.id,
            public_id: row.public_id,
            participants,
            last_message_id: row.last_message_id,
            updated_at: row.updated_at,
        })
    }
}
