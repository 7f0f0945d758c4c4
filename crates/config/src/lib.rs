use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "herald.toml",
    "config/herald.toml",
    "crates/config/herald.toml",
    "../herald.toml",
    "../config/herald.toml",
    "../crates/config/herald.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://herald.db".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "AuthConfig::default_session_ttl")]
    pub session_ttl_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_seconds: Self::default_session_ttl(),
        }
    }
}

impl AuthConfig {
    fn default_session_ttl() -> u64 {
        86_400
    }
}

/// Analytics stream settings. Publishing is disabled while `url` is unset.
///
/// ```
/// use herald_config::RedisConfig;
///
/// let redis = RedisConfig::default();
/// assert!(redis.url.is_none());
/// assert_eq!(redis.stream_key, "message-events");
/// assert_eq!(redis.stream_max_len, 10_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "RedisConfig::default_stream_key")]
    pub stream_key: String,
    #[serde(default = "RedisConfig::default_stream_max_len")]
    pub stream_max_len: u64,
}

impl RedisConfig {
    fn default_stream_key() -> String {
        "message-events".to_string()
    }

    const fn default_stream_max_len() -> u64 {
        10_000
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            stream_key: Self::default_stream_key(),
            stream_max_len: Self::default_stream_max_len(),
        }
    }
}

/// Timeouts and buffer sizes used while fanning a message out to recipients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "DeliveryConfig::default_push_timeout")]
    pub push_timeout_ms: u64,
    #[serde(default = "DeliveryConfig::default_publish_timeout")]
    pub publish_timeout_ms: u64,
    #[serde(default = "DeliveryConfig::default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl DeliveryConfig {
    const fn default_push_timeout() -> u64 {
        2_000
    }

    const fn default_publish_timeout() -> u64 {
        5_000
    }

    const fn default_outbound_buffer() -> usize {
        64
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            push_timeout_ms: Self::default_push_timeout(),
            publish_timeout_ms: Self::default_publish_timeout(),
            outbound_buffer: Self::default_outbound_buffer(),
        }
    }
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use herald_config::load;
///
/// std::env::remove_var("HERALD_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default(
            "auth.session_ttl_seconds",
            clamp_to_i64(defaults.auth.session_ttl_seconds),
        )?
        .set_default("redis.stream_key", defaults.redis.stream_key.clone())?
        .set_default(
            "redis.stream_max_len",
            clamp_to_i64(defaults.redis.stream_max_len),
        )?
        .set_default(
            "delivery.push_timeout_ms",
            clamp_to_i64(defaults.delivery.push_timeout_ms),
        )?
        .set_default(
            "delivery.publish_timeout_ms",
            clamp_to_i64(defaults.delivery.publish_timeout_ms),
        )?
        .set_default(
            "delivery.outbound_buffer",
            clamp_to_i64(defaults.delivery.outbound_buffer as u64),
        )?;

    let environment_overrides = config::Environment::with_prefix("HERALD").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("HERALD_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via HERALD_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    if config.auth.session_ttl_seconds > i64::MAX as u64 {
        config.auth.session_ttl_seconds = i64::MAX as u64;
    }

    if config.delivery.outbound_buffer == 0 {
        config.delivery.outbound_buffer = 1;
    }

    if config.redis.url.as_deref().is_some_and(|url| url.trim().is_empty()) {
        config.redis.url = None;
    }

    debug!(?config, "loaded backend configuration");
    Ok(config)
}
