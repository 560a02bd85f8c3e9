use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvEntry, KvError, KvStore};

#[derive(Debug)]
struct Stored {
    value: String,
    expires_at: Option<Instant>,
}

impl Stored {
    fn live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local store used when no `REDIS_URL` is configured.
/// Expired keys read as absent and are dropped on the next write.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<BTreeMap<String, Stored>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn store(&self, key: &str, value: &str, expires_at: Option<Instant>) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, stored| stored.live(now));
        entries.insert(
            key.to_string(),
            Stored {
                value: value.to_string(),
                expires_at,
            },
        );
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let now = Instant::now();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .filter(|stored| stored.live(now))
            .map(|stored| stored.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), KvError> {
        self.store(key, value, None).await;
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        self.store(key, value, Some(Instant::now() + ttl)).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let now = Instant::now();
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|stored| stored.live(now)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<KvEntry>, KvError> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, stored)| stored.live(now))
            .map(|(key, stored)| KvEntry {
                key: key.clone(),
                value: stored.value.clone(),
            })
            .collect())
    }
}
