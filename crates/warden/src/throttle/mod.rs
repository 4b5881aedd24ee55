//! Per-identity, per-action attempt counting.
//!
//! Both backends use a fixed window: the first attempt opens a window of
//! `period`, every call records one attempt, and the count resets once the
//! window closes. `remaining` includes the attempt being recorded, so with
//! `max_count = 3` successive calls report 3, 2, 1, 0, -1, ...

mod memory;
mod redis_counter;

pub use memory::MemoryRateCounter;
pub use redis_counter::RedisRateCounter;

use std::time::Duration;

use async_trait::async_trait;
use quill_common::Result;
use quill_common::constants::cache_keys::THROTTLE_PREFIX;

#[async_trait]
pub trait RateCounter: Send + Sync {
    /// Record one attempt and report how many remain in the current window
    async fn remaining(
        &self,
        identity: &str,
        action: &str,
        max_count: i64,
        period: Duration,
    ) -> Result<i64>;
}

/// Counter key: throttle:{action}:{identity}
pub(crate) fn counter_key(identity: &str, action: &str) -> String {
    format!("{THROTTLE_PREFIX}{action}:{identity}")
}

/// Attempts left once the current one (included in `count`) is spent
pub(crate) fn remaining_after(max_count: i64, count: i64) -> i64 {
    max_count - count + 1
}
