#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use herald_config::DatabaseConfig;
use herald_database::{prepare_database, run_migrations};
use herald_delivery::{
    ChannelPusher, ConnectionHandle, ConnectionRegistry, Conversation, ConversationRepository,
    DeliveryService, DeliverySettings, EventPublisher, Message, MessageEvent, PublishError,
    PushError, Pusher,
};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Counts pushes per recipient before forwarding to the real channel pusher.
#[derive(Default)]
pub struct CountingPusher {
    pushes: Mutex<Vec<(i64, String)>>,
}

impl CountingPusher {
    pub fn pushes_to(&self, user_id: i64) -> usize {
        self.pushes
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| *recipient == user_id)
            .count()
    }

    pub fn total(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }
}

#[async_trait]
impl Pusher for CountingPusher {
    async fn push(&self, handle: &ConnectionHandle, message: &Message) -> Result<(), PushError> {
        self.pushes
            .lock()
            .unwrap()
            .push((handle.user_id, message.public_id.clone()));
        ChannelPusher.push(handle, message).await
    }
}

/// Reports every event it sees and then either succeeds or fails.
pub struct RecordingPublisher {
    events: mpsc::UnboundedSender<MessageEvent>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new(fail: bool) -> (Self, mpsc::UnboundedReceiver<MessageEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (Self { events, fail }, receiver)
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &MessageEvent) -> Result<(), PublishError> {
        let _ = self.events.send(event.clone());
        if self.fail {
            return Err(PublishError::Unavailable("simulated outage".into()));
        }
        Ok(())
    }
}

pub struct TestContext {
    pub pool: SqlitePool,
    pub registry: ConnectionRegistry,
    pub pusher: Arc<CountingPusher>,
    pub service: DeliveryService,
    pub events: mpsc::UnboundedReceiver<MessageEvent>,
    _temp_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> TestResult<Self> {
        Self::with_failing_publisher(false).await
    }

    pub async fn with_failing_publisher(fail: bool) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("delivery.db").display()),
            max_connections: 8,
        };
        let pool = prepare_database(&config).await?;
        run_migrations(&pool).await?;

        let registry = ConnectionRegistry::new();
        let pusher = Arc::new(CountingPusher::default());
        let (publisher, events) = RecordingPublisher::new(fail);

        let service = DeliveryService::new(
            pool.clone(),
            Arc::new(registry.clone()),
            pusher.clone(),
            Arc::new(publisher),
            DeliverySettings::default(),
        );

        Ok(Self {
            pool,
            registry,
            pusher,
            service,
            events,
            _temp_dir: temp_dir,
        })
    }

    pub async fn user(&self, display_name: &str) -> TestResult<i64> {
        let now = "2024-01-01T00:00:00.000000Z";
        let id = sqlx::query(
            "INSERT INTO users (public_id, email, display_name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(format!("user-{}", display_name.to_lowercase()))
        .bind(format!("{}@example.com", display_name.to_lowercase()))
        .bind(display_name)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn conversation(&self, participants: &[i64]) -> TestResult<Conversation> {
        let conversation = ConversationRepository::new(self.pool.clone())
            .create(None, participants)
            .await?;
        Ok(conversation)
    }

    pub async fn message_count(&self) -> TestResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
