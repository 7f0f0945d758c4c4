//! Test utilities for repository and service tests

use herald_config::DatabaseConfig;
use herald_database::{prepare_database, run_migrations};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::utils::{new_public_id, now_timestamp};

/// Creates a migrated sqlite database in a temp directory
pub async fn create_test_db() -> (SqlitePool, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 5,
    };

    let pool = prepare_database(&config)
        .await
        .expect("Failed to create test database");
    run_migrations(&pool).await.expect("Failed to run migrations");

    (pool, temp_dir)
}

/// Creates a test user and returns its internal id
pub async fn create_test_user(pool: &SqlitePool, display_name: &str) -> i64 {
    let now = now_timestamp();
    sqlx::query(
        "INSERT INTO users (public_id, email, display_name, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(new_public_id())
    .bind(format!("{}@example.com", display_name.to_lowercase()))
    .bind(display_name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("Failed to create test user")
    .last_insert_rowid()
}
