//! In-memory cache store for tests and single-process deployments.
//!
//! Entries expire lazily: an expired entry is dropped on the next read.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::ports::{CacheError, CacheStore};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local cache keyed under a cache name.
#[derive(Debug, Clone)]
pub struct InMemoryCacheStore {
    name: String,
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl InMemoryCacheStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.name, key)
    }

    /// Whether a live entry exists for `key`.
    pub async fn contains(&self, key: &str) -> bool {
        let entries = self.entries.read().await;
        entries
            .get(&self.namespaced(key))
            .is_some_and(|e| e.expires_at > Instant::now())
    }

    /// Number of stored entries, including ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = self.namespaced(key);
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired
        self.entries.write().await.remove(&key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(self.namespaced(key), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_returns_none_on_miss() {
        let cache = InMemoryCacheStore::new("billing");
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = InMemoryCacheStore::new("billing");
        cache.set("k", "true", Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("true"));
        assert!(cache.contains("k").await);
    }

    #[tokio::test]
    async fn expired_entries_are_evicted_on_read() {
        let cache = InMemoryCacheStore::new("billing");
        cache.set("k", "true", Duration::ZERO).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn stores_with_different_names_share_nothing_by_key() {
        let a = InMemoryCacheStore::new("a");
        a.set("k", "1", Duration::from_secs(60)).await.unwrap();

        let b = InMemoryCacheStore::new("b");
        assert_eq!(b.get("k").await.unwrap(), None);
    }
}
