//! services/portal/src/adapters/cache.rs
//!
//! An in-process implementation of the `CacheBackend` port: string payloads
//! with an absolute expiry per entry. Expired entries read as absent and are
//! evicted on the read that finds them.

use async_trait::async_trait;
use enrollment_core::ports::{CacheBackend, PortResult};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::trace;

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryCacheAdapter {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCacheAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheAdapter {
    async fn get_string(&self, key: &str) -> PortResult<Option<String>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if Instant::now() < entry.expires_at => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
            }
        }

        // Re-check under the write lock; a concurrent set may have refreshed it.
        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| Instant::now() >= entry.expires_at)
        {
            trace!(key, "Evicting expired cache entry");
            entries.remove(key);
        }
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set_string(&self, key: &str, value: String, ttl: Duration) -> PortResult<()> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
