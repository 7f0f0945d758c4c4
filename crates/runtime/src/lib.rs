use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use herald_auth::Authenticator;
use herald_config::{AppConfig, RedisConfig};
use herald_database::initialize_database;
use herald_delivery::{
    ChannelPusher, ConnectionRegistry, DeliveryService, DeliverySettings, DisabledPublisher,
    EventPublisher, RedisStreamPublisher,
};
use redis::aio::ConnectionManager;
use sqlx::SqlitePool;
use tokio::time::timeout;
use tracing::{info, warn};

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub registry: ConnectionRegistry,
    pub delivery: Arc<DeliveryService>,
    pub redis_conn: Option<ConnectionManager>,
    pub outbound_buffer: usize,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());
        let registry = ConnectionRegistry::new();

        let redis_conn = connect_redis(&config.redis).await;
        let publisher: Arc<dyn EventPublisher> = match &redis_conn {
            Some(connection) => {
                let publisher = RedisStreamPublisher::new(connection.clone(), &config.redis);
                info!(stream = %publisher.stream_key(), "analytics events go to redis");
                Arc::new(publisher)
            }
            None => Arc::new(DisabledPublisher),
        };

        let settings = DeliverySettings::from(&config.delivery);
        let delivery = Arc::new(DeliveryService::new(
            db_pool.clone(),
            Arc::new(registry.clone()),
            Arc::new(ChannelPusher),
            publisher,
            settings,
        ));

        info!(
            push_timeout_ms = settings.push_timeout.as_millis() as u64,
            publish_timeout_ms = settings.publish_timeout.as_millis() as u64,
            "delivery service ready"
        );

        Ok(Self {
            db_pool,
            authenticator,
            registry,
            delivery,
            redis_conn,
            outbound_buffer: config.delivery.outbound_buffer,
        })
    }
}

/// Opens the analytics connection. Any failure disables publishing instead of
/// aborting startup.
async fn connect_redis(config: &RedisConfig) -> Option<ConnectionManager> {
    let Some(url) = config.url.as_deref() else {
        info!("no redis url configured, analytics publishing disabled");
        return None;
    };

    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(error) => {
            warn!(%error, "failed to create redis client, proceeding without redis");
            return None;
        }
    };

    let mut connection = match timeout(REDIS_CONNECT_TIMEOUT, ConnectionManager::new(client)).await {
        Ok(Ok(connection)) => connection,
        Ok(Err(error)) => {
            warn!(%error, "failed to connect to redis, proceeding without redis");
            return None;
        }
        Err(_) => {
            warn!("timed out connecting to redis, proceeding without redis");
            return None;
        }
    };

    let ping = timeout(
        REDIS_CONNECT_TIMEOUT,
        redis::cmd("PING").query_async::<_, String>(&mut connection),
    )
    .await;

    match ping {
        Ok(Ok(_)) => {
            info!("redis connection established");
            Some(connection)
        }
        Ok(Err(error)) => {
            warn!(%error, "redis did not answer PING, proceeding without redis");
            None
        }
        Err(_) => {
            warn!("redis PING timed out, proceeding without redis");
            None
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
