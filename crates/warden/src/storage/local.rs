//! Local disk storage for single-node and development deployments.
//!
//! Thumbnails are rendered at write time next to the original, once in the
//! original's format and once as WebP: `photo.png` with a `thumb` spec
//! yields `photo_thumb.png` and `photo_thumb.webp`.

use std::io::{Cursor, ErrorKind};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use quill_common::constants::ORIGINAL_VARIANT;
use quill_common::{
    ClientCapabilities, QuillError, Result, ThumbnailSpecs, ValidationError, VariantUrls,
};

use super::{StorageAdapter, join_url};
use crate::config::LocalStorageConfig;

pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    pub fn new(config: &LocalStorageConfig) -> Self {
        Self {
            root: config.root.clone(),
            base_url: config.base_url.clone(),
        }
    }

    /// Filesystem location of `path`, refusing anything that escapes the root
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let contained = relative.components().next().is_some()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(ValidationError::field("path", "invalid").into());
        }
        Ok(self.root.join(relative))
    }

    /// Write each variant, recording the files created so far
    async fn write_variants(
        &self,
        variants: &[(String, Vec<u8>)],
        written: &mut Vec<PathBuf>,
    ) -> Result<()> {
        for (variant, bytes) in variants {
            let file = self.resolve(variant)?;
            write_file(&file, bytes).await?;
            written.push(file);
        }
        Ok(())
    }

    fn variant_paths(path: &str, thumbnails: &ThumbnailSpecs) -> Vec<String> {
        thumbnails
            .keys()
            .flat_map(|name| {
                [
                    variant_path(path, name, None),
                    variant_path(path, name, Some("webp")),
                ]
            })
            .collect()
    }
}

/// `dir/stem.ext` -> `dir/stem_{name}.{ext}`, optionally swapping the extension
fn variant_path(path: &str, name: &str, extension: Option<&str>) -> String {
    let (dir, file) = match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    };
    let (stem, original_ext) = match file.rfind('.') {
        Some(i) if i > 0 => (&file[..i], Some(&file[i + 1..])),
        _ => (file, None),
    };
    match extension.or(original_ext) {
        Some(ext) => format!("{dir}{stem}_{name}.{ext}"),
        None => format!("{dir}{stem}_{name}"),
    }
}

fn io_error(err: std::io::Error) -> QuillError {
    QuillError::Storage(err.to_string())
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .map_err(|e| QuillError::Storage(format!("Failed to encode thumbnail: {e}")))?;
    Ok(buf)
}

/// Undecodable uploads are the client's fault, not the store's
fn invalid_image(err: image::ImageError) -> QuillError {
    tracing::debug!(error = %err, "Upload is not a decodable image");
    ValidationError::field("file", "invalid image").into()
}

/// Encoded thumbnails keyed by their variant path
fn render_thumbnails(
    path: &str,
    data: &[u8],
    thumbnails: &ThumbnailSpecs,
) -> Result<Vec<(String, Vec<u8>)>> {
    let format = image::guess_format(data).map_err(invalid_image)?;
    let original = image::load_from_memory_with_format(data, format).map_err(invalid_image)?;

    let mut rendered = Vec::with_capacity(thumbnails.len() * 2);
    for (name, spec) in thumbnails {
        let thumb = original.resize_to_fill(spec.width.max(1), spec.height.max(1), FilterType::Triangle);
        rendered.push((variant_path(path, name, None), encode(&thumb, format)?));

        let webp = DynamicImage::ImageRgba8(thumb.to_rgba8());
        rendered.push((
            variant_path(path, name, Some("webp")),
            encode(&webp, ImageFormat::WebP)?,
        ));
    }
    Ok(rendered)
}

async fn write_file(target: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(target, data).await.map_err(io_error)
}

#[async_trait]
impl StorageAdapter for LocalStorage {
    fn name(&self) -> &'static str {
        "local"
    }

    fn get(
        &self,
        path: &str,
        thumbnails: &ThumbnailSpecs,
        client: ClientCapabilities,
    ) -> VariantUrls {
        let extension = client.accepts_webp.then_some("webp");
        let mut urls: VariantUrls = thumbnails
            .keys()
            .map(|name| {
                let variant = variant_path(path, name, extension);
                (name.clone(), join_url(&self.base_url, &variant))
            })
            .collect();
        urls.insert(ORIGINAL_VARIANT.to_string(), join_url(&self.base_url, path));
        urls
    }

    async fn write(&self, path: &str, data: Vec<u8>, thumbnails: &ThumbnailSpecs) -> Result<()> {
        let target = self.resolve(path)?;

        // Decode before touching disk so a bad upload leaves nothing behind
        let variants = if thumbnails.is_empty() {
            Vec::new()
        } else {
            let (path, data, thumbnails) = (path.to_string(), data.clone(), thumbnails.clone());
            tokio::task::spawn_blocking(move || render_thumbnails(&path, &data, &thumbnails))
                .await
                .map_err(|e| QuillError::Internal(format!("Thumbnail task failed: {e}")))??
        };

        // Variants first, original last: a reader that sees the original
        // also finds its thumbnails
        let mut written = Vec::with_capacity(variants.len());
        let mut outcome = self.write_variants(&variants, &mut written).await;
        if outcome.is_ok() {
            outcome = write_file(&target, &data).await;
        }

        if let Err(e) = outcome {
            for file in &written {
                if let Err(cleanup) = tokio::fs::remove_file(file).await {
                    tracing::warn!(file = %file.display(), error = %cleanup, "Failed to remove partial upload");
                }
            }
            return Err(e);
        }

        tracing::info!(
            path = %path,
            size = data.len(),
            variants = variants.len(),
            "Object stored on local disk"
        );
        Ok(())
    }

    async fn delete(&self, path: &str, thumbnails: &ThumbnailSpecs) -> Result<()> {
        let mut paths = vec![path.to_string()];
        paths.extend(Self::variant_paths(path, thumbnails));

        for p in paths {
            match tokio::fs::remove_file(self.resolve(&p)?).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(e)),
            }
        }

        tracing::info!(path = %path, "Object removed from local disk");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};
    use quill_common::ThumbnailSpec;

    use super::*;

    fn storage(root: &Path) -> LocalStorage {
        LocalStorage::new(&LocalStorageConfig {
            root: root.to_path_buf(),
            base_url: "https://files.example.com/uploads/".into(),
        })
    }

    fn thumbs() -> ThumbnailSpecs {
        let mut specs = ThumbnailSpecs::new();
        specs.insert("thumb".into(), ThumbnailSpec::new(16, 16));
        specs
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 30, 90])));
        encode(&image, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_variant_path() {
        assert_eq!(variant_path("q/photo.png", "thumb", None), "q/photo_thumb.png");
        assert_eq!(variant_path("q/photo.png", "thumb", Some("webp")), "q/photo_thumb.webp");
        assert_eq!(variant_path("photo", "big", None), "photo_big");
        assert_eq!(variant_path("a.b/.hidden", "t", None), "a.b/.hidden_t");
    }

    #[test]
    fn test_get_urls() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        let urls = storage.get("q/photo.png", &thumbs(), ClientCapabilities::default());
        assert_eq!(urls["o"], "https://files.example.com/uploads/q/photo.png");
        assert_eq!(urls["thumb"], "https://files.example.com/uploads/q/photo_thumb.png");

        let urls = storage.get("q/photo.png", &thumbs(), ClientCapabilities { accepts_webp: true });
        assert_eq!(urls["thumb"], "https://files.example.com/uploads/q/photo_thumb.webp");
    }

    #[tokio::test]
    async fn test_write_renders_thumbnails_and_delete_removes_them() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        storage.write("q/photo.png", png(64, 48), &thumbs()).await.unwrap();

        let original = dir.path().join("q/photo.png");
        let thumb = dir.path().join("q/photo_thumb.png");
        let webp = dir.path().join("q/photo_thumb.webp");
        assert!(original.exists() && thumb.exists() && webp.exists());

        let decoded = image::open(&thumb).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 16));

        storage.delete("q/photo.png", &thumbs()).await.unwrap();
        assert!(!original.exists() && !thumb.exists() && !webp.exists());

        // Already gone: still fine
        storage.delete("q/photo.png", &thumbs()).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_image_needs_no_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        storage
            .write("docs/readme.txt", b"hello".to_vec(), &ThumbnailSpecs::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("docs/readme.txt")).unwrap(), b"hello");

        let err = storage
            .write("docs/fake.png", b"not an image".to_vec(), &thumbs())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.as_validation().unwrap().message("file"), Some("invalid image"));
        assert!(!dir.path().join("docs/fake.png").exists());

        let err = storage
            .write("docs/a.pdf", b"%PDF-1.4 hello".to_vec(), &thumbs())
            .await
            .unwrap_err();
        assert_eq!(err.as_validation().unwrap().message("file"), Some("invalid image"));
    }

    #[tokio::test]
    async fn test_failed_variant_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        // A directory squatting on the WebP variant makes that write fail
        std::fs::create_dir_all(dir.path().join("q/photo_thumb.webp")).unwrap();

        let err = storage.write("q/photo.png", png(32, 32), &thumbs()).await.unwrap_err();
        assert!(matches!(err, QuillError::Storage(_)));
        assert!(!dir.path().join("q/photo.png").exists());
        assert!(!dir.path().join("q/photo_thumb.png").exists());
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        for bad in ["../escape.png", "q/../../escape.png", "", "/"] {
            let err = storage
                .write(bad, png(4, 4), &ThumbnailSpecs::new())
                .await
                .unwrap_err();
            assert!(err.as_validation().is_some(), "accepted {bad:?}");
        }
    }
}
