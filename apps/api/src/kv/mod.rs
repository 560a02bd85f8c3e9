//! Key-value persistence for resume records and sessions.

pub mod memory;
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryKvStore;
pub use redis_store::RedisKvStore;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: String,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError>;

    /// Like `set`, but the store drops the key once `ttl` has passed.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool, KvError>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>, KvError>;
}
