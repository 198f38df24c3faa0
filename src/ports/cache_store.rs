//! CacheStore port - Key-value cache with per-entry TTL.
//!
//! Entries are idempotent projections of remote state, so adapters need
//! no locking across keys.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns `None` on a miss or an expired entry.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}
