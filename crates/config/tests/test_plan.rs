//! Loader tests for the `herald-config` crate.
//!
//! These tests exercise default handling, file discovery, environment
//! overrides, and the normalisation applied after deserialisation.

use std::fs;
use std::path::{Path, PathBuf};

use serial_test::serial;
use tempfile::TempDir;

use herald_config::{load, AppConfig, DeliveryConfig, HttpConfig, RedisConfig};

const ENV_VARS_TO_RESET: &[&str] = &[
    "HERALD_CONFIG",
    "HERALD__AUTH__SESSION_TTL_SECONDS",
    "HERALD__DATABASE__MAX_CONNECTIONS",
    "HERALD__DATABASE__URL",
    "HERALD__DELIVERY__OUTBOUND_BUFFER",
    "HERALD__DELIVERY__PUBLISH_TIMEOUT_MS",
    "HERALD__DELIVERY__PUSH_TIMEOUT_MS",
    "HERALD__HTTP__ADDRESS",
    "HERALD__HTTP__PORT",
    "HERALD__REDIS__STREAM_KEY",
    "HERALD__REDIS__STREAM_MAX_LEN",
    "HERALD__REDIS__URL",
];

struct TestContext {
    vars: Vec<(String, Option<String>)>,
    original_dir: Option<PathBuf>,
}

impl TestContext {
    fn new() -> Self {
        let mut ctx = Self {
            vars: Vec::new(),
            original_dir: None,
        };
        for key in ENV_VARS_TO_RESET {
            ctx.remove_var(key);
        }
        ctx
    }

    fn set_var(&mut self, key: &str, value: impl AsRef<str>) {
        let previous = std::env::var(key).ok();
        std::env::set_var(key, value.as_ref());
        self.vars.push((key.to_string(), previous));
    }

    fn remove_var(&mut self, key: &str) {
        let previous = std::env::var(key).ok();
        std::env::remove_var(key);
        self.vars.push((key.to_string(), previous));
    }

    fn set_current_dir(&mut self, dir: &Path) {
        if self.original_dir.is_none() {
            self.original_dir =
                Some(std::env::current_dir().expect("failed to capture current directory"));
        }
        std::env::set_current_dir(dir).expect("failed to set current directory");
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if let Some(original) = self.original_dir.take() {
            let _ = std::env::set_current_dir(original);
        }

        while let Some((key, value)) = self.vars.pop() {
            match value {
                Some(val) => std::env::set_var(&key, val),
                None => std::env::remove_var(&key),
            }
        }
    }
}

fn write_config_file(root: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("failed to create config directories");
    }
    fs::write(&path, contents).expect("failed to write config file");
    path
}

#[test]
#[serial]
fn load_uses_default_values_when_no_files_found() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    let config = load().expect("configuration load should succeed without files");
    let defaults = AppConfig::default();

    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.http.port, defaults.http.port);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(
        config.database.max_connections,
        defaults.database.max_connections
    );
    assert_eq!(config.auth.session_ttl_seconds, defaults.auth.session_ttl_seconds);
    assert!(config.redis.url.is_none());
    assert_eq!(config.redis.stream_key, defaults.redis.stream_key);
    assert_eq!(config.delivery.push_timeout_ms, defaults.delivery.push_timeout_ms);
    assert_eq!(
        config.delivery.publish_timeout_ms,
        defaults.delivery.publish_timeout_ms
    );
}

#[test]
#[serial]
fn load_picks_first_available_file_in_search_order() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "herald.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    write_config_file(
        temp_dir.path(),
        "config/herald.toml",
        r#"
        [http]
        port = 5151
        "#,
    );

    let config = load().expect("configuration load should pick the first file");
    assert_eq!(config.http.port, 4242);
}

#[test]
#[serial]
fn load_prefers_explicit_config_path() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "herald.toml",
        r#"
        [http]
        port = 4242
        "#,
    );
    let explicit = write_config_file(
        temp_dir.path(),
        "elsewhere/custom.toml",
        r#"
        [http]
        port = 6060
        "#,
    );
    ctx.set_var("HERALD_CONFIG", explicit.to_string_lossy());

    let config = load().expect("configuration load should use HERALD_CONFIG");
    assert_eq!(config.http.port, 6060);
}

#[test]
#[serial]
fn load_merges_partial_file_with_defaults() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "herald.toml",
        r#"
        [database]
        max_connections = 50

        [delivery]
        push_timeout_ms = 250
        "#,
    );

    let config = load().expect("configuration load should succeed");
    let defaults = AppConfig::default();

    assert_eq!(config.database.max_connections, 50);
    assert_eq!(config.database.url, defaults.database.url);
    assert_eq!(config.http.address, defaults.http.address);
    assert_eq!(config.delivery.push_timeout_ms, 250);
    assert_eq!(
        config.delivery.outbound_buffer,
        defaults.delivery.outbound_buffer
    );
}

#[test]
#[serial]
fn load_applies_environment_overrides() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "herald.toml",
        r#"
        [http]
        port = 3030
        "#,
    );

    ctx.set_var("HERALD__HTTP__PORT", "8080");
    ctx.set_var("HERALD__DELIVERY__PUBLISH_TIMEOUT_MS", "900");

    let config = load().expect("configuration load should honour env overrides");
    assert_eq!(config.http.port, 8080);
    assert_eq!(config.delivery.publish_timeout_ms, 900);
}

#[test]
#[serial]
fn load_reads_redis_settings_from_file() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "herald.toml",
        r#"
        [redis]
        url = "redis://127.0.0.1:6379"
        stream_key = "analytics"
        "#,
    );

    let config = load().expect("configuration load should read redis section");
    assert_eq!(config.redis.url.as_deref(), Some("redis://127.0.0.1:6379"));
    assert_eq!(config.redis.stream_key, "analytics");
    assert_eq!(
        config.redis.stream_max_len,
        RedisConfig::default().stream_max_len
    );
}

#[test]
#[serial]
fn load_treats_blank_redis_url_as_disabled() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "herald.toml",
        r#"
        [redis]
        url = "  "
        "#,
    );

    let config = load().expect("configuration load should succeed");
    assert!(config.redis.url.is_none());
}

#[test]
#[serial]
fn load_raises_zero_outbound_buffer_to_one() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    ctx.set_var("HERALD__DELIVERY__OUTBOUND_BUFFER", "0");

    let config = load().expect("configuration load should succeed");
    assert_eq!(config.delivery.outbound_buffer, 1);
}

#[test]
#[serial]
fn load_clamps_session_ttl_to_i64_maximum() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    let oversized = (i64::MAX as u128 + 42).to_string();
    ctx.set_var("HERALD__AUTH__SESSION_TTL_SECONDS", &oversized);

    let config = load().expect("configuration load should succeed with oversized TTL");
    assert_eq!(
        config.auth.session_ttl_seconds,
        i64::MAX as u64,
        "session TTL should be clamped to i64::MAX"
    );
}

#[test]
#[serial]
fn load_errors_on_invalid_toml_contents() {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut ctx = TestContext::new();
    ctx.set_current_dir(temp_dir.path());

    write_config_file(
        temp_dir.path(),
        "herald.toml",
        r#"
        [http]
        port = "not-a-number
        "#,
    );

    let error = load().expect_err("invalid TOML should cause load to fail");
    let message = error.to_string();
    assert!(
        message.contains("invalid configuration") || message.contains("unable to build configuration"),
        "unexpected error message: {message}"
    );
}

#[test]
fn delivery_config_defaults_bound_push_and_publish() {
    let defaults = DeliveryConfig::default();
    assert_eq!(defaults.push_timeout_ms, 2_000);
    assert_eq!(defaults.publish_timeout_ms, 5_000);
    assert_eq!(defaults.outbound_buffer, 64);
}

#[test]
fn http_config_defaults_match_expected_host_and_port() {
    let defaults = HttpConfig::default();
    assert_eq!(defaults.address, "127.0.0.1");
    assert_eq!(defaults.port, 7070);
}
