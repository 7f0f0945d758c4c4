//! Membership check performed before every read and write.

use crate::entities::Conversation;
use crate::repositories::ConversationRepository;
use crate::types::{DeliveryError, DeliveryResult};

#[derive(Clone)]
pub struct AuthorizationGate {
    conversations: ConversationRepository,
}

impl AuthorizationGate {
    pub fn new(conversations: ConversationRepository) -> Self {
        Self { conversations }
    }

    /// Returns the conversation when `user_id` takes part in it.
    pub async fn authorize(&self, conversation_id: &str, user_id: i64) -> DeliveryResult<Conversation> {
        let conversation = self
            .conversations
            .find_by_public_id(conversation_id)
            .await?
            .ok_or_else(|| DeliveryError::conversation_not_found(conversation_id))?;

        if !conversation.is_participant(user_id) {
            return Err(DeliveryError::forbidden("Not a participant of this conversation"));
        }

        Ok(conversation)
    }
}
