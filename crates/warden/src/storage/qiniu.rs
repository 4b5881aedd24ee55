//! Signed-URL cloud object store (Qiniu Kodo).
//!
//! Thumbnails are never uploaded; the provider renders them on the fly from
//! `imageView2` query parameters on the original's URL.

use std::time::Duration;

use async_trait::async_trait;
use quill_common::constants::{ORIGINAL_VARIANT, QINIU_NO_SUCH_ENTRY};
use quill_common::{
    ClientCapabilities, QuillError, Result, ThumbnailSpecs, ValidationError, VariantUrls,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::signer::{Signer, base64_url_encode};
use super::{StorageAdapter, Zone, join_url};
use crate::config::QiniuConfig;

/// Resource management API host
pub const DEFAULT_RS_ENDPOINT: &str = "https://rs.qiniu.com";

pub struct QiniuStorage {
    signer: Signer,
    zone: Zone,
    base_url: String,
    upload_endpoint: String,
    rs_endpoint: String,
    client: reqwest::Client,
}

/// Error body returned by the provider's APIs
#[derive(Deserialize)]
struct ProviderError {
    error: Option<String>,
}

impl QiniuStorage {
    pub fn new(config: &QiniuConfig) -> Result<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() || config.bucket.is_empty()
        {
            return Err(QuillError::Config(
                "qiniu storage requires access_key, secret_key and bucket".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| QuillError::Config(format!("Failed to build HTTP client: {e}")))?;

        let upload_endpoint = config
            .upload_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://{}", config.zone.upload_host()));
        let rs_endpoint = config
            .rs_endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_RS_ENDPOINT.to_string());

        Ok(Self {
            signer: Signer::new(&config.access_key, config.secret_key.as_str(), &config.bucket),
            zone: config.zone,
            base_url: config.base_url.clone(),
            upload_endpoint,
            rs_endpoint: rs_endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }
}

/// Bucket key for a logical path; keys carry no leading slash
fn object_key(path: &str) -> Result<&str> {
    let key = path.trim_start_matches('/');
    if key.is_empty() {
        return Err(ValidationError::field("path", "required").into());
    }
    Ok(key)
}

fn transport_error(err: reqwest::Error) -> QuillError {
    QuillError::Storage(err.to_string())
}

/// The provider's `error` message, else the HTTP reason phrase
async fn provider_reason(response: reqwest::Response) -> String {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match response.json::<ProviderError>().await {
        Ok(ProviderError { error: Some(message) }) if !message.is_empty() => message,
        _ => fallback,
    }
}

#[async_trait]
impl StorageAdapter for QiniuStorage {
    fn name(&self) -> &'static str {
        "qiniu"
    }

    fn get(
        &self,
        path: &str,
        thumbnails: &ThumbnailSpecs,
        client: ClientCapabilities,
    ) -> VariantUrls {
        let original = join_url(&self.base_url, path);
        let mut urls = VariantUrls::new();

        for (name, spec) in thumbnails {
            let mut url = format!("{original}?imageView2/1/w/{}/h/{}", spec.width, spec.height);
            if client.accepts_webp {
                url.push_str("/format/webp");
            }
            urls.insert(name.clone(), url);
        }
        urls.insert(ORIGINAL_VARIANT.to_string(), original);
        urls
    }

    async fn write(&self, path: &str, data: Vec<u8>, _thumbnails: &ThumbnailSpecs) -> Result<()> {
        let key = object_key(path)?;
        let token = self.signer.upload_token(key)?;
        let file_name = key.rsplit('/').next().unwrap_or(key).to_string();
        let size = data.len();

        let form = Form::new()
            .text("key", key.to_string())
            .text("token", token)
            .part("file", Part::bytes(data).file_name(file_name));

        let response = self
            .client
            .post(&self.upload_endpoint)
            .header(HOST, self.zone.upload_host())
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let reason = provider_reason(response).await;
            tracing::warn!(
                key = %key,
                status = status.as_u16(),
                reason = %reason,
                "Upload rejected by storage provider"
            );
            return Err(QuillError::Storage(reason));
        }

        tracing::info!(
            key = %key,
            bucket = %self.signer.bucket(),
            zone = %self.zone,
            size,
            "Object uploaded"
        );
        Ok(())
    }

    async fn delete(&self, path: &str, _thumbnails: &ThumbnailSpecs) -> Result<()> {
        let key = object_key(path)?;
        let entry = base64_url_encode(format!("{}:{}", self.signer.bucket(), key));
        let resource = format!("/delete/{entry}");
        let token = self.signer.access_token(&resource)?;

        let response = self
            .client
            .post(format!("{}{}", self.rs_endpoint, resource))
            .header(AUTHORIZATION, format!("QBox {token}"))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.as_u16() == QINIU_NO_SUCH_ENTRY {
            tracing::debug!(key = %key, "Object already absent");
            return Ok(());
        }
        if !status.is_success() {
            let reason = provider_reason(response).await;
            tracing::warn!(
                key = %key,
                status = status.as_u16(),
                reason = %reason,
                "Delete rejected by storage provider"
            );
            return Err(QuillError::Storage(reason));
        }

        tracing::info!(key = %key, bucket = %self.signer.bucket(), "Object deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use quill_common::ThumbnailSpec;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer) -> QiniuConfig {
        QiniuConfig {
            access_key: "quill-ak".into(),
            secret_key: "quill-sk".into(),
            bucket: "quill".into(),
            zone: Zone::Z1,
            base_url: "https://img.example.com/".into(),
            upload_endpoint: Some(server.uri()),
            rs_endpoint: Some(server.uri()),
            timeout_secs: 5,
        }
    }

    fn thumbs() -> ThumbnailSpecs {
        let mut specs = ThumbnailSpecs::new();
        specs.insert("thumb".into(), ThumbnailSpec::new(100, 100));
        specs
    }

    #[tokio::test]
    async fn test_get_builds_transform_urls() {
        let server = MockServer::start().await;
        let storage = QiniuStorage::new(&config_for(&server)).unwrap();

        let urls = storage.get("q/1.png", &thumbs(), ClientCapabilities::default());
        assert_eq!(urls["o"], "https://img.example.com/q/1.png");
        assert_eq!(
            urls["thumb"],
            "https://img.example.com/q/1.png?imageView2/1/w/100/h/100"
        );

        let webp = ClientCapabilities { accepts_webp: true };
        let urls = storage.get("q/1.png", &thumbs(), webp);
        assert_eq!(urls["o"], "https://img.example.com/q/1.png");
        assert_eq!(
            urls["thumb"],
            "https://img.example.com/q/1.png?imageView2/1/w/100/h/100/format/webp"
        );
    }

    #[tokio::test]
    async fn test_write_posts_signed_multipart_to_zone_host() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("host", "up-z1.qiniup.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "key": "q/1.png",
                "hash": "FvtLzUnU2RGo0tzxVrxdJq9qbN0p"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let storage = QiniuStorage::new(&config_for(&server)).unwrap();
        storage
            .write("/q/1.png", b"fake-png-bytes".to_vec(), &thumbs())
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("name=\"key\"\r\n\r\nq/1.png\r\n"));
        assert!(body.contains("name=\"token\"\r\n\r\nquill-ak:"));
        assert!(body.contains("filename=\"1.png\""));
        assert!(body.contains("fake-png-bytes"));
    }

    #[tokio::test]
    async fn test_write_surfaces_provider_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "bad token"})))
            .mount(&server)
            .await;

        let storage = QiniuStorage::new(&config_for(&server)).unwrap();
        let err = storage
            .write("q/1.png", b"x".to_vec(), &ThumbnailSpecs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Storage(ref reason) if reason == "bad token"));
    }

    #[tokio::test]
    async fn test_write_falls_back_to_reason_phrase() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let storage = QiniuStorage::new(&config_for(&server)).unwrap();
        let err = storage
            .write("q/1.png", b"x".to_vec(), &ThumbnailSpecs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, QuillError::Storage(ref reason) if reason == "Service Unavailable"));
    }

    #[tokio::test]
    async fn test_delete_sends_qbox_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/delete/cXVpbGw6cS8xLnBuZw=="))
            .and(header(
                "authorization",
                "QBox quill-ak:fyQ1Qq4VXX31RnREF-ffltYZYOs=",
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let storage = QiniuStorage::new(&config_for(&server)).unwrap();
        storage.delete("q/1.png", &thumbs()).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_of_missing_object_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(612).set_body_json(json!({"error": "no such file or directory"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let storage = QiniuStorage::new(&config_for(&server)).unwrap();
        storage.delete("q/1.png", &thumbs()).await.unwrap();
        storage.delete("q/1.png", &thumbs()).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_surfaces_other_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(631).set_body_json(json!({"error": "no such bucket"})))
            .mount(&server)
            .await;

        let storage = QiniuStorage::new(&config_for(&server)).unwrap();
        let err = storage.delete("q/1.png", &thumbs()).await.unwrap_err();
        assert!(matches!(err, QuillError::Storage(ref reason) if reason == "no such bucket"));
    }

    #[tokio::test]
    async fn test_rejects_empty_path_and_missing_credentials() {
        let server = MockServer::start().await;
        let storage = QiniuStorage::new(&config_for(&server)).unwrap();
        let err = storage.delete("/", &thumbs()).await.unwrap_err();
        assert!(err.as_validation().is_some());

        let mut config = config_for(&server);
        config.secret_key = String::new();
        assert!(matches!(QiniuStorage::new(&config), Err(QuillError::Config(_))));
    }
}
