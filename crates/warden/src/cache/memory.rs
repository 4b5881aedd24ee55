//! In-process token cache for single-node deployments and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use quill_common::Result;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::TokenCache;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Expiring map behind a single mutex; every operation is atomic
#[derive(Default)]
pub struct MemoryTokenCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| e.expires_at > now).count()
    }
}

#[async_trait]
impl TokenCache for MemoryTokenCache {
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        let mut entries = self.entries.lock().await;
        // Opportunistic sweep keeps abandoned challenges from piling up
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(e) if e.expires_at > Instant::now() => Ok(Some(e.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn take(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        Ok(entries
            .remove(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
