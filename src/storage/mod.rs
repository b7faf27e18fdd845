//! # Durable Storage Surface
//!
//! Key-value storage used by the offline queue so pending operations
//! survive restarts. The runtime supplies an implementation; the engine
//! only assumes `get`/`set`/`remove` semantics.
//!
//! ## Key Components
//!
//! - `StorageAdapter`: the storage trait
//! - `MemoryStorage`: in-memory implementation for tests and ephemeral use
//! - `sqlite::SqliteStorage`: durable implementation backed by sqlx

pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::DispatchError;

/// Durable key-value storage surface
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Read a value by key
    async fn get(&self, key: &str) -> Result<Option<String>, DispatchError>;

    /// Write a value, overwriting any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), DispatchError>;

    /// Delete a key
    async fn remove(&self, key: &str) -> Result<(), DispatchError>;
}

/// In-memory storage for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, DispatchError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), DispatchError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DispatchError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();

        storage.set("queue", "[]").await.unwrap();
        assert_eq!(storage.get("queue").await.unwrap(), Some("[]".to_string()));

        storage.remove("queue").await.unwrap();
        assert_eq!(storage.get("queue").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_key() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("absent").await.unwrap(), None);
    }
}
