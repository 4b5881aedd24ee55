//! Token cache: short-lived key/value storage with per-key expiry.
//!
//! Backs the CAPTCHA challenge lifecycle. `take` must be atomic so a
//! challenge can be consumed at most once under concurrent requests.

mod memory;
mod redis_cache;

pub use memory::MemoryTokenCache;
pub use redis_cache::RedisTokenCache;
pub(crate) use redis_cache::redis_error;

use async_trait::async_trait;
use quill_common::Result;

#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Store `value` under `key`, expiring after `ttl_secs`
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Read a live value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove a key; missing keys are not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Read and remove in one atomic step
    async fn take(&self, key: &str) -> Result<Option<String>>;

    /// Backend liveness probe
    async fn ping(&self) -> Result<()>;
}
