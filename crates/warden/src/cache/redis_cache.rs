//! Redis-backed token cache.

use async_trait::async_trait;
use quill_common::{QuillError, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::TokenCache;

/// Token cache over a shared auto-reconnecting Redis connection
#[derive(Clone)]
pub struct RedisTokenCache {
    redis: ConnectionManager,
}

impl RedisTokenCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

pub(crate) fn redis_error(err: redis::RedisError) -> QuillError {
    QuillError::Cache(err.to_string())
}

#[async_trait]
impl TokenCache for RedisTokenCache {
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(redis_error)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        conn.get(key).await.map_err(redis_error)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(key).await.map_err(redis_error)
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        // MULTI/EXEC instead of GETDEL keeps Redis < 6.2 working
        let mut conn = self.redis.clone();
        let (value, _removed): (Option<String>, i64) = redis::pipe()
            .atomic()
            .get(key)
            .del(key)
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(value)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.redis.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;
        Ok(())
    }
}
