//! Hands a message to a live connection.

use async_trait::async_trait;

use crate::entities::Message;
use crate::services::presence::ConnectionHandle;
use crate::types::{PushError, ServerEvent};

#[async_trait]
pub trait Pusher: Send + Sync {
    async fn push(&self, handle: &ConnectionHandle, message: &Message) -> Result<(), PushError>;
}

/// Queues a `new_message` event on the connection's outbound channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelPusher;

#[async_trait]
impl Pusher for ChannelPusher {
    async fn push(&self, handle: &ConnectionHandle, message: &Message) -> Result<(), PushError> {
        handle.try_send(ServerEvent::NewMessage {
            message: message.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DeliveryStatus, SenderProfile};
    use tokio::sync::mpsc;

    fn message() -> Message {
        Message {
            id: 1,
            public_id: "m1".into(),
            conversation_id: "c1".into(),
            sender_id: 1,
            sender: SenderProfile {
                id: "u1".into(),
                display_name: None,
                avatar_url: None,
            },
            text: Some("hi".into()),
            image: None,
            file: None,
            status: DeliveryStatus::Sent,
            deliveries: Vec::new(),
            created_at: "2024-01-01T00:00:00.000000Z".into(),
        }
    }

    #[tokio::test]
    async fn push_queues_new_message_event() {
        let (sender, mut receiver) = mpsc::channel(2);
        let handle = ConnectionHandle::new(1, 2, sender);

        ChannelPusher.push(&handle, &message()).await.unwrap();

        match receiver.recv().await {
            Some(ServerEvent::NewMessage { message }) => assert_eq!(message.public_id, "m1"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn push_to_closed_connection_fails() {
        let (sender, receiver) = mpsc::channel(2);
        let handle = ConnectionHandle::new(4, 2, sender);
        drop(receiver);

        let error = ChannelPusher.push(&handle, &message()).await.unwrap_err();
        assert!(matches!(error, PushError::Closed { connection_id: 4 }));
    }
}
