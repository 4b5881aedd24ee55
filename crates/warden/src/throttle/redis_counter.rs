//! Redis fixed-window rate counter.

use std::time::Duration;

use async_trait::async_trait;
use quill_common::Result;
use redis::aio::ConnectionManager;

use super::{RateCounter, counter_key, remaining_after};
use crate::cache::redis_error;

#[derive(Clone)]
pub struct RedisRateCounter {
    redis: ConnectionManager,
}

impl RedisRateCounter {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl RateCounter for RedisRateCounter {
    async fn remaining(
        &self,
        identity: &str,
        action: &str,
        max_count: i64,
        period: Duration,
    ) -> Result<i64> {
        let key = counter_key(identity, action);
        let mut conn = self.redis.clone();

        // SET NX opens the window with its expiry in the same transaction
        // as the increment, so a counter can never outlive its period.
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(&key)
            .arg(0)
            .arg("EX")
            .arg(period.as_secs().max(1))
            .arg("NX")
            .ignore()
            .incr(&key, 1)
            .query_async(&mut conn)
            .await
            .map_err(redis_error)?;

        let remaining = remaining_after(max_count, count);
        tracing::debug!(
            identity = %identity,
            action = %action,
            count = count,
            remaining = remaining,
            "Throttle counter updated"
        );
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Live server from `REDIS_URL`; run with `cargo test -- --ignored`
    async fn live_counter() -> Option<(RedisRateCounter, ConnectionManager)> {
        let url = std::env::var("REDIS_URL").ok()?;
        let client = redis::Client::open(url).unwrap();
        let redis = ConnectionManager::new(client).await.unwrap();
        Some((RedisRateCounter::new(redis.clone()), redis))
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn test_window_counts_down_and_expires() {
        let Some((counter, mut conn)) = live_counter().await else {
            return;
        };
        let identity = uuid::Uuid::new_v4().to_string();
        let period = Duration::from_secs(60);

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(counter.remaining(&identity, "post", 3, period).await.unwrap());
        }
        assert_eq!(seen, vec![3, 2, 1, 0]);

        let ttl: i64 = redis::cmd("TTL")
            .arg(counter_key(&identity, "post"))
            .query_async(&mut conn)
            .await
            .unwrap();
        assert!((1..=60).contains(&ttl), "ttl {ttl}");
    }
}
