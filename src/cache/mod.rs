use std::time::Duration;

pub mod memory;
pub mod redis;

pub use memory::InMemoryCache;
pub use redis::RedisCache;

/// Key/value store with per-entry expiry. The delivery core only ever
/// writes; entries exist for downstream consumers and fall out via TTL.
#[async_trait::async_trait]
pub trait Cache: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
}
