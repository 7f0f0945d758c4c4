//! Send and read paths: authorize, record, fan out, settle the aggregate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use herald_config::DeliveryConfig;
use sqlx::SqlitePool;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::entities::{Message, MessageContent};
use crate::repositories::{ConversationRepository, MessageRepository};
use crate::services::authorization::AuthorizationGate;
use crate::services::events::{EventPublisher, MessageEvent};
use crate::services::presence::PresenceDirectory;
use crate::services::pusher::Pusher;
use crate::types::{DeliveryError, DeliveryResult, PublishError, PushError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliverySettings {
    /// Upper bound for one push to one recipient.
    pub push_timeout: Duration,
    /// Upper bound for the detached analytics publish.
    pub publish_timeout: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for DeliverySettings {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            push_timeout: Duration::from_millis(config.push_timeout_ms),
            publish_timeout: Duration::from_millis(config.publish_timeout_ms),
        }
    }
}

#[derive(Clone)]
pub struct DeliveryService {
    gate: AuthorizationGate,
    conversations: ConversationRepository,
    ledger: MessageRepository,
    presence: Arc<dyn PresenceDirectory>,
    pusher: Arc<dyn Pusher>,
    publisher: Arc<dyn EventPublisher>,
    settings: DeliverySettings,
}

impl DeliveryService {
    pub fn new(
        pool: SqlitePool,
        presence: Arc<dyn PresenceDirectory>,
        pusher: Arc<dyn Pusher>,
        publisher: Arc<dyn EventPublisher>,
        settings: DeliverySettings,
    ) -> Self {
        let conversations = ConversationRepository::new(pool.clone());
        Self {
            gate: AuthorizationGate::new(conversations.clone()),
            conversations,
            ledger: MessageRepository::new(pool),
            presence,
            pusher,
            publisher,
            settings,
        }
    }

    pub fn ledger(&self) -> &MessageRepository {
        &self.ledger
    }

    pub fn conversations(&self) -> &ConversationRepository {
        &self.conversations
    }

    pub fn settings(&self) -> DeliverySettings {
        self.settings
    }

    /// Sends `content` from `sender_id` into a conversation and returns the
    /// message as stored once every recipient has been tried.
    ///
    /// Push failures and analytics failures never fail the send; the affected
    /// entries simply stay `sent`.
    pub async fn send(
        &self,
        conversation_id: &str,
        sender_id: i64,
        content: MessageContent,
    ) -> DeliveryResult<Message> {
        let conversation = self.gate.authorize(conversation_id, sender_id).await?;
        let content = content.normalized()?;
        let recipients = conversation.recipients_for(sender_id);

        let message = self
            .ledger
            .create(&conversation, sender_id, &content, &recipients)
            .await?;

        info!(
            message_id = %message.public_id,
            conversation_id = %conversation.public_id,
            sender_id,
            recipients = message.deliveries.len(),
            "created new message"
        );

        self.spawn_publish(MessageEvent::from_message(&message));

        self.conversations
            .touch_last_message(conversation.id, message.id, &message.created_at)
            .await?;

        let outcomes = join_all(
            message
                .recipient_ids()
                .map(|recipient_id| self.deliver_to(&message, recipient_id)),
        )
        .await;
        let delivered = outcomes.iter().filter(|delivered| **delivered).count();

        let status = self.ledger.recompute_aggregate_status(message.id).await?;

        info!(
            message_id = %message.public_id,
            recipients = outcomes.len(),
            delivered,
            status = %status,
            "fan-out complete"
        );

        self.ledger
            .find_by_id(message.id)
            .await?
            .ok_or_else(|| DeliveryError::message_not_found(&message.public_id))
    }

    /// Messages of a conversation the caller takes part in, oldest first.
    pub async fn list_messages(
        &self,
        conversation_id: &str,
        user_id: i64,
    ) -> DeliveryResult<Vec<Message>> {
        let conversation = self.gate.authorize(conversation_id, user_id).await?;
        self.ledger.list_by_conversation(conversation.id).await
    }

    /// One recipient: look up, push, then mark. Returns whether the entry
    /// ended up delivered.
    async fn deliver_to(&self, message: &Message, recipient_id: i64) -> bool {
        let Some(handle) = self.presence.lookup(recipient_id).await else {
            debug!(message_id = %message.public_id, recipient_id, "recipient offline");
            return false;
        };

        let pushed = match timeout(self.settings.push_timeout, self.pusher.push(&handle, message)).await {
            Ok(result) => result,
            Err(_) => Err(PushError::TimedOut(self.settings.push_timeout)),
        };

        if let Err(error) = pushed {
            warn!(
                message_id = %message.public_id,
                recipient_id,
                connection_id = handle.connection_id,
                %error,
                "push failed, leaving entry as sent"
            );
            return false;
        }

        match self
            .ledger
            .mark_delivered(message.id, recipient_id, Utc::now())
            .await
        {
            Ok(()) => {
                debug!(message_id = %message.public_id, recipient_id, "delivered");
                true
            }
            Err(error) => {
                warn!(
                    message_id = %message.public_id,
                    recipient_id,
                    %error,
                    "failed to record delivery"
                );
                false
            }
        }
    }

    fn spawn_publish(&self, event: MessageEvent) {
        let publisher = Arc::clone(&self.publisher);
        let limit = self.settings.publish_timeout;

        tokio::spawn(async move {
            let result = match timeout(limit, publisher.publish(&event)).await {
                Ok(result) => result,
                Err(_) => Err(PublishError::TimedOut(limit)),
            };

            if let Err(error) = result {
                warn!(message_id = %event.message_id, %error, "failed to publish message event");
            }
        });
    }
}
