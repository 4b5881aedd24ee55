//! Configuration management for Warden.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quill_common::constants::{
    CAPTCHA_TTL_SECS, DEFAULT_CAPTCHA_HEIGHT, DEFAULT_CAPTCHA_WIDTH, DEFAULT_LISTEN_ADDR,
    DEFAULT_PHRASE_LENGTH, DEFAULT_REDIS_URL, DEFAULT_THROTTLE_MAX_COUNT,
    DEFAULT_THROTTLE_PERIOD_SECS,
};
use quill_common::{ThumbnailSpec, ThumbnailSpecs};

use crate::storage::Zone;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Where challenges and throttle counters live
    #[serde(default)]
    pub cache_backend: CacheBackend,

    /// CAPTCHA configuration
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Per-action throttle rules
    #[serde(default)]
    pub throttle: ThrottleConfig,

    /// Image storage provider
    #[serde(default)]
    pub storage: StorageConfig,

    /// Named thumbnail variants served for every image
    #[serde(default = "default_thumbnails")]
    pub thumbnails: ThumbnailSpecs,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Redis,
    /// In-process maps; single node only
    Memory,
}

/// CAPTCHA-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Default image width when the client does not ask for one
    #[serde(default = "default_captcha_width")]
    pub width: u32,

    /// Default image height
    #[serde(default = "default_captcha_height")]
    pub height: u32,

    /// Characters per phrase
    #[serde(default = "default_phrase_length")]
    pub phrase_length: usize,

    /// Challenge validity in seconds
    #[serde(default = "default_challenge_ttl")]
    pub challenge_ttl_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            width: default_captcha_width(),
            height: default_captcha_height(),
            phrase_length: default_phrase_length(),
            challenge_ttl_secs: default_challenge_ttl(),
        }
    }
}

/// Attempts allowed per period before a captcha is demanded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ThrottleRule {
    #[serde(default = "default_max_count")]
    pub max_count: i64,

    #[serde(default = "default_period")]
    pub period_secs: u64,
}

impl ThrottleRule {
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }
}

impl Default for ThrottleRule {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
            period_secs: default_period(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThrottleConfig {
    /// Rule for actions without their own entry
    #[serde(default)]
    pub default: ThrottleRule,

    /// Overrides keyed by action name
    #[serde(default)]
    pub actions: HashMap<String, ThrottleRule>,
}

impl ThrottleConfig {
    pub fn rule_for(&self, action: &str) -> ThrottleRule {
        self.actions.get(action).copied().unwrap_or(self.default)
    }
}

/// Storage provider selection
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum StorageConfig {
    Qiniu(QiniuConfig),
    Local(LocalStorageConfig),
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local(LocalStorageConfig::default())
    }
}

/// Signed-URL cloud object store settings
#[derive(Clone, Deserialize)]
pub struct QiniuConfig {
    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,

    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub zone: Zone,

    /// Public download domain, e.g. `https://img.example.com`
    #[serde(default)]
    pub base_url: String,

    /// Upload endpoint override (IP or edge address); Host stays the zone's
    #[serde(default)]
    pub upload_endpoint: Option<String>,

    /// Resource management endpoint override
    #[serde(default)]
    pub rs_endpoint: Option<String>,

    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

impl Default for QiniuConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            zone: Zone::default(),
            base_url: String::new(),
            upload_endpoint: None,
            rs_endpoint: None,
            timeout_secs: default_storage_timeout(),
        }
    }
}

impl fmt::Debug for QiniuConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QiniuConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("zone", &self.zone)
            .field("base_url", &self.base_url)
            .field("upload_endpoint", &self.upload_endpoint)
            .field("rs_endpoint", &self.rs_endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Local disk storage settings
#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_root")]
    pub root: PathBuf,

    #[serde(default = "default_local_base_url")]
    pub base_url: String,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            root: default_local_root(),
            base_url: default_local_base_url(),
        }
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_captcha_width() -> u32 { DEFAULT_CAPTCHA_WIDTH }
fn default_captcha_height() -> u32 { DEFAULT_CAPTCHA_HEIGHT }
fn default_phrase_length() -> usize { DEFAULT_PHRASE_LENGTH }
fn default_challenge_ttl() -> u64 { CAPTCHA_TTL_SECS } // 1 hour
fn default_max_count() -> i64 { DEFAULT_THROTTLE_MAX_COUNT }
fn default_period() -> u64 { DEFAULT_THROTTLE_PERIOD_SECS }
fn default_storage_timeout() -> u64 { 30 }
fn default_local_root() -> PathBuf { PathBuf::from("data/uploads") }
fn default_local_base_url() -> String { "/uploads".to_string() }

fn default_thumbnails() -> ThumbnailSpecs {
    let mut specs = ThumbnailSpecs::new();
    specs.insert("thumb".to_string(), ThumbnailSpec::new(200, 200));
    specs
}

/// `QUILL__SECTION__KEY` variables. Values are parsed as numbers and
/// booleans where possible; the tagged `[storage]` section would otherwise
/// receive them as strings.
fn environment() -> config::Environment {
    config::Environment::with_prefix("QUILL")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

impl AppConfig {
    /// Load configuration from file and `QUILL__*` environment variables,
    /// with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        if !Path::new(config_path).exists() {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(environment())
            .build()
            .context("Failed to load config")?;

        let mut config: Self = settings
            .try_deserialize()
            .context("Failed to parse config")?;

        // Apply CLI overrides
        if let Some(ref redis_url) = args.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            cache_backend: CacheBackend::default(),
            captcha: CaptchaConfig::default(),
            throttle: ThrottleConfig::default(),
            storage: StorageConfig::default(),
            thumbnails: default_thumbnails(),
        }
    }
}
