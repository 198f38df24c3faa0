//! Redis-backed cache store for multi-server deployments.
//!
//! Values are written with `SET key value EX ttl`, so expiry is handled by
//! Redis itself.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

use crate::ports::{CacheError, CacheStore};

/// Redis cache store. Keys are prefixed with the configured cache name.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: MultiplexedConnection,
    name: String,
}

impl RedisCacheStore {
    pub fn new(conn: MultiplexedConnection, name: impl Into<String>) -> Self {
        Self {
            conn,
            name: name.into(),
        }
    }

    /// Opens a multiplexed connection to `url`.
    pub async fn connect(url: &str, name: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(unavailable)?;
        Ok(Self::new(conn, name))
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}:{}", self.name, key)
    }
}

fn unavailable(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(self.redis_key(key)).await.map_err(unavailable)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        // SET EX rejects 0
        let secs = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.redis_key(key), value, secs)
            .await
            .map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    // Redis integration tests require a running Redis instance and are run
    // separately:
    //
    // #[tokio::test]
    // #[ignore]
    // async fn round_trips_through_redis() {
    //     let cache = RedisCacheStore::connect("redis://127.0.0.1/", "billing").await.unwrap();
    //     cache.set("k", "true", Duration::from_secs(5)).await.unwrap();
    //     assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("true"));
    // }
}
