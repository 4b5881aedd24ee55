//! In-process fixed-window rate counter.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use quill_common::Result;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{RateCounter, counter_key, remaining_after};

struct Window {
    count: i64,
    closes_at: Instant,
}

#[derive(Default)]
pub struct MemoryRateCounter {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked windows, closed ones included until the next sweep
    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl RateCounter for MemoryRateCounter {
    async fn remaining(
        &self,
        identity: &str,
        action: &str,
        max_count: i64,
        period: Duration,
    ) -> Result<i64> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        // Drop closed windows of every identity, not just this one
        windows.retain(|_, w| w.closes_at > now);

        let window = windows
            .entry(counter_key(identity, action))
            .or_insert(Window {
                count: 0,
                closes_at: now + period,
            });
        window.count += 1;

        Ok(remaining_after(max_count, window.count))
    }
}
