//! Cache store adapters used by the subscription status check.

mod in_memory;
mod redis;

pub use self::redis::RedisCacheStore;
pub use in_memory::InMemoryCacheStore;
