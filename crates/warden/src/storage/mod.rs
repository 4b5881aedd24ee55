//! Image storage adapters.
//!
//! Every provider implements [`StorageAdapter`]: build variant URLs, write
//! an object, delete an object. Thumbnails are named `(width, height)`
//! variants; how they come to exist is the provider's business (rendered on
//! read by the cloud store, rendered on write by the local disk store).
//!
//! The concrete adapter is picked from configuration by [`build_adapter`].

mod local;
mod qiniu;
mod signer;
mod zone;

pub use local::LocalStorage;
pub use qiniu::QiniuStorage;
pub use zone::Zone;

use std::sync::Arc;

use async_trait::async_trait;
use quill_common::{ClientCapabilities, Result, ThumbnailSpecs, VariantUrls};

use crate::config::StorageConfig;

#[async_trait]
pub trait StorageAdapter: Send + Sync {
    /// Provider name for logs
    fn name(&self) -> &'static str;

    /// Public URLs for the original (`"o"`) and each thumbnail variant
    fn get(&self, path: &str, thumbnails: &ThumbnailSpecs, client: ClientCapabilities)
    -> VariantUrls;

    /// Persist `data` at `path`
    async fn write(&self, path: &str, data: Vec<u8>, thumbnails: &ThumbnailSpecs) -> Result<()>;

    /// Remove `path` and its variants; removing a missing object succeeds
    async fn delete(&self, path: &str, thumbnails: &ThumbnailSpecs) -> Result<()>;
}

/// Construct the adapter selected by `config`
pub fn build_adapter(config: &StorageConfig) -> Result<Arc<dyn StorageAdapter>> {
    let adapter: Arc<dyn StorageAdapter> = match config {
        StorageConfig::Qiniu(qiniu) => Arc::new(QiniuStorage::new(qiniu)?),
        StorageConfig::Local(local) => Arc::new(LocalStorage::new(local)),
    };
    tracing::info!(provider = adapter.name(), "Storage adapter ready");
    Ok(adapter)
}

/// `base` and `path` joined by exactly one slash
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LocalStorageConfig, QiniuConfig};

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://img.example.com/", "q/1.png"), "https://img.example.com/q/1.png");
        assert_eq!(join_url("https://img.example.com", "/q/1.png"), "https://img.example.com/q/1.png");
        assert_eq!(join_url("/uploads/", "a.png"), "/uploads/a.png");
    }

    #[test]
    fn test_factory_selects_provider() {
        let local = build_adapter(&StorageConfig::Local(LocalStorageConfig::default())).unwrap();
        assert_eq!(local.name(), "local");

        let qiniu = build_adapter(&StorageConfig::Qiniu(QiniuConfig {
            access_key: "ak".into(),
            secret_key: "sk".into(),
            bucket: "quill".into(),
            base_url: "https://img.example.com".into(),
            ..Default::default()
        }))
        .unwrap();
        assert_eq!(qiniu.name(), "qiniu");
    }
}
