//! Herald Database Crate
//!
//! Pool preparation and embedded migrations for the Herald backend. Domain
//! queries live with the crates that own them.

use sqlx::SqlitePool;
use herald_config::DatabaseConfig;

pub mod connection;
pub mod migrations;
pub mod types;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};
pub use types::{errors::DatabaseError, DatabaseResult};

/// Re-export commonly used types for convenience
pub use sqlx::Pool;

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_database() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn test_database_initialization_creates_delivery_tables() {
        let (pool, _temp_dir) = create_test_database().await;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('messages', 'message_deliveries', 'conversations', 'conversation_participants') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        assert_eq!(
            tables,
            vec![
                "conversation_participants".to_string(),
                "conversations".to_string(),
                "message_deliveries".to_string(),
                "messages".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let (pool, _temp_dir) = create_test_database().await;

        let result: (bool,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert!(result.0);
    }

    #[tokio::test]
    async fn test_delivery_status_is_constrained() {
        let (pool, _temp_dir) = create_test_database().await;

        let now = "2024-01-01T00:00:00.000000Z";
        sqlx::query("INSERT INTO users (public_id, created_at, updated_at) VALUES ('u1', ?, ?)")
            .bind(now)
            .bind(now)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO conversations (public_id, created_at, updated_at) VALUES ('c1', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        let result = sqlx::query(
            "INSERT INTO messages (public_id, conversation_id, sender_id, text, status, created_at) VALUES ('m1', 1, 1, 'hi', 'read', ?)",
        )
        .bind(now)
        .execute(&pool)
        .await;

        assert!(result.is_err(), "only sent and delivered are valid statuses");
    }
}
