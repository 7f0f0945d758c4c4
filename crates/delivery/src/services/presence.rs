//! Who is reachable right now.
//!
//! The websocket layer registers a [`ConnectionHandle`] per user while a
//! socket is open; delivery only ever looks handles up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::types::{PushError, ServerEvent};

/// Outbound side of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: u64,
    pub user_id: i64,
    sender: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    pub fn new(connection_id: u64, user_id: i64, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            connection_id,
            user_id,
            sender,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Queues an event without waiting for room in the buffer.
    pub fn try_send(&self, event: ServerEvent) -> Result<(), PushError> {
        self.sender.try_send(event).map_err(|error| match error {
            mpsc::error::TrySendError::Full(_) => PushError::Full {
                connection_id: self.connection_id,
            },
            mpsc::error::TrySendError::Closed(_) => PushError::Closed {
                connection_id: self.connection_id,
            },
        })
    }
}

#[async_trait]
pub trait PresenceDirectory: Send + Sync {
    /// `None` means the user is not reachable at the moment.
    async fn lookup(&self, user_id: i64) -> Option<ConnectionHandle>;
}

/// Process-wide map of user id to their current connection.
///
/// A user holds at most one handle; registering again replaces the previous one.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<i64, ConnectionHandle>>>,
    next_connection_id: Arc<AtomicU64>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        user_id: i64,
        buffer: usize,
    ) -> (ConnectionHandle, mpsc::Receiver<ServerEvent>) {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let handle = ConnectionHandle::new(connection_id, user_id, sender);

        let replaced = self
            .connections
            .write()
            .await
            .insert(user_id, handle.clone());

        debug!(
            user_id,
            connection_id,
            replaced = ?replaced.map(|previous| previous.connection_id),
            "connection registered"
        );
        (handle, receiver)
    }

    /// Removes the user's handle only if it is still `connection_id`, so a
    /// late disconnect cannot evict a newer connection.
    pub async fn unregister(&self, user_id: i64, connection_id: u64) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get(&user_id) {
            Some(current) if current.connection_id == connection_id => {
                connections.remove(&user_id);
                debug!(user_id, connection_id, "connection unregistered");
                true
            }
            _ => false,
        }
    }

    pub async fn connected_count(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[async_trait]
impl PresenceDirectory for ConnectionRegistry {
    async fn lookup(&self, user_id: i64) -> Option<ConnectionHandle> {
        let connections = self.connections.read().await;
        connections
            .get(&user_id)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_returns_registered_handle() {
        let registry = ConnectionRegistry::new();
        let (handle, _rx) = registry.register(7, 4).await;

        let found = registry.lookup(7).await.expect("user should be reachable");
        assert_eq!(found.connection_id, handle.connection_id);
        assert!(registry.lookup(8).await.is_none());
    }

    #[tokio::test]
    async fn stale_unregister_keeps_newer_connection() {
        let registry = ConnectionRegistry::new();
        let (first, _rx1) = registry.register(1, 4).await;
        let (second, _rx2) = registry.register(1, 4).await;

        assert!(!registry.unregister(1, first.connection_id).await);
        assert_eq!(
            registry.lookup(1).await.map(|h| h.connection_id),
            Some(second.connection_id)
        );

        assert!(registry.unregister(1, second.connection_id).await);
        assert!(registry.lookup(1).await.is_none());
        assert_eq!(registry.connected_count().await, 0);
    }

    #[tokio::test]
    async fn closed_handle_is_not_reachable() {
        let registry = ConnectionRegistry::new();
        let (_handle, rx) = registry.register(3, 4).await;
        drop(rx);

        assert!(registry.lookup(3).await.is_none());
    }

    #[tokio::test]
    async fn try_send_reports_full_and_closed_queues() {
        let (sender, receiver) = mpsc::channel(1);
        let handle = ConnectionHandle::new(9, 1, sender);
        let event = || ServerEvent::Error {
            message: "x".into(),
        };

        handle.try_send(event()).unwrap();
        assert!(matches!(
            handle.try_send(event()),
            Err(PushError::Full { connection_id: 9 })
        ));

        drop(receiver);
        assert!(matches!(
            handle.try_send(event()),
            Err(PushError::Closed { connection_id: 9 })
        ));
    }

    #[tokio::test]
    async fn concurrent_lookups_share_the_registry() {
        let registry = ConnectionRegistry::new();
        let mut receivers = Vec::new();
        for user_id in 0..16 {
            let (_, rx) = registry.register(user_id, 1).await;
            receivers.push(rx);
        }

        let lookups = (0..32).map(|user_id| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.lookup(user_id).await.is_some() })
        });
        let results = futures::future::join_all(lookups).await;

        let reachable = results.into_iter().filter(|r| *r.as_ref().unwrap()).count();
        assert_eq!(reachable, 16);
    }
}
