//! SQLite-backed storage
//!
//! Durable key-value implementation of `StorageAdapter` over a single
//! `kv_store` table. The schema is created on open, so a fresh database
//! file works without a separate migration step.

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::error::DispatchError;
use crate::storage::StorageAdapter;

/// Durable key-value storage backed by SQLite
#[derive(Debug)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open or create the database at `path` and initialize the schema
    pub async fn open(path: &str) -> Result<Self, DispatchError> {
        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePool::connect(&database_url)
            .await
            .map_err(|e| DispatchError::storage(e.to_string()))?;
        Self::from_pool(pool).await
    }

    /// Open an in-memory database, useful for tests. Pinned to a single
    /// connection: every pooled connection would otherwise get its own
    /// private in-memory database.
    pub async fn in_memory() -> Result<Self, DispatchError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| DispatchError::storage(e.to_string()))?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, DispatchError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| DispatchError::storage(e.to_string()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, DispatchError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DispatchError::storage(e.to_string()))?;

        match row {
            Some(row) => {
                let value = row
                    .try_get("value")
                    .map_err(|e| DispatchError::storage(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), DispatchError> {
        sqlx::query(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
             VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(value)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| DispatchError::storage(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DispatchError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| DispatchError::storage(e.to_string()))?;
        Ok(())
    }
}
