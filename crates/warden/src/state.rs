//! Application state and shared resources.

use std::sync::Arc;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;

use crate::cache::{MemoryTokenCache, RedisTokenCache, TokenCache};
use crate::captcha::{CaptchaGate, CaptchaGenerator};
use crate::config::{AppConfig, CacheBackend};
use crate::storage::{StorageAdapter, build_adapter};
use crate::throttle::{MemoryRateCounter, RateCounter, RedisRateCounter};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Challenge store (also probed by the readiness check)
    pub cache: Arc<dyn TokenCache>,

    /// CAPTCHA issue, verification, and throttle gate
    pub captcha_gate: Arc<CaptchaGate>,

    /// Image storage provider
    pub storage: Arc<dyn StorageAdapter>,
}

impl AppState {
    /// Create new application state, connecting to Redis when configured
    pub async fn new(config: AppConfig) -> Result<Self> {
        let (cache, counter): (Arc<dyn TokenCache>, Arc<dyn RateCounter>) =
            match config.cache_backend {
                CacheBackend::Redis => {
                    let client = redis::Client::open(config.redis_url.as_str())
                        .context("Failed to create Redis client")?;

                    // Connection manager handles reconnection
                    let redis = ConnectionManager::new(client)
                        .await
                        .context("Failed to connect to Redis")?;

                    (
                        Arc::new(RedisTokenCache::new(redis.clone())),
                        Arc::new(RedisRateCounter::new(redis)),
                    )
                }
                CacheBackend::Memory => {
                    tracing::warn!("Using in-memory cache; state is not shared between nodes");
                    (
                        Arc::new(MemoryTokenCache::new()),
                        Arc::new(MemoryRateCounter::new()),
                    )
                }
            };

        let storage = build_adapter(&config.storage).context("Failed to configure storage")?;

        Ok(Self::from_parts(config, cache, counter, storage))
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: AppConfig,
        cache: Arc<dyn TokenCache>,
        counter: Arc<dyn RateCounter>,
        storage: Arc<dyn StorageAdapter>,
    ) -> Self {
        let captcha_gate = Arc::new(CaptchaGate::new(
            cache.clone(),
            counter,
            CaptchaGenerator::new(config.captcha.phrase_length),
            config.captcha.challenge_ttl_secs,
        ));

        Self {
            config: Arc::new(config),
            cache,
            captcha_gate,
            storage,
        }
    }
}
