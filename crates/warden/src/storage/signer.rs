//! Request signing for the signed-URL object store.
//!
//! Upload token: `accessKey:base64url(hmac_sha1(secret, policy)):policy`
//! where `policy` is the base64url JSON `{"scope":"bucket:key","deadline":t}`.
//! Access token: `accessKey:base64url(hmac_sha1(secret, resource + "\n"))`.
//!
//! Tokens are recomputed per request and must never be logged.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE};
use hmac::{Hmac, Mac};
use quill_common::constants::UPLOAD_TOKEN_TTL_SECS;
use quill_common::{QuillError, Result};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use zeroize::Zeroizing;

type HmacSha1 = Hmac<Sha1>;

/// Base64 with `+` -> `-` and `/` -> `_`, padding kept
pub fn base64_url_encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE.encode(bytes)
}

/// Upload policy as the provider expects it; field order is part of the
/// signed bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutPolicy {
    pub scope: String,
    pub deadline: i64,
}

pub struct Signer {
    access_key: String,
    secret_key: Zeroizing<String>,
    bucket: String,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl Signer {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: Zeroizing::new(secret_key.into()),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Encoded policy granting upload of `key` until `now + 1h`
    pub fn build_policy(&self, key: &str, now: i64) -> Result<String> {
        let policy = PutPolicy {
            scope: format!("{}:{}", self.bucket, key),
            deadline: now + UPLOAD_TOKEN_TTL_SECS,
        };
        let json = serde_json::to_string(&policy)
            .map_err(|e| QuillError::Internal(format!("Failed to encode put policy: {e}")))?;
        Ok(base64_url_encode(json))
    }

    pub fn upload_token(&self, key: &str) -> Result<String> {
        self.upload_token_at(key, chrono::Utc::now().timestamp())
    }

    /// Upload token as signed at unix time `now`
    pub fn upload_token_at(&self, key: &str, now: i64) -> Result<String> {
        let policy = self.build_policy(key, now)?;
        let signature = self.sign(policy.as_bytes())?;
        Ok(format!("{}:{}:{}", self.access_key, signature, policy))
    }

    /// Management token for `resource_path`, e.g. `/delete/{entry}`
    pub fn access_token(&self, resource_path: &str) -> Result<String> {
        let signature = self.sign(format!("{resource_path}\n").as_bytes())?;
        Ok(format!("{}:{}", self.access_key, signature))
    }

    fn sign(&self, data: &[u8]) -> Result<String> {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| QuillError::Internal(format!("Invalid signing key: {e}")))?;
        mac.update(data);
        Ok(base64_url_encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn signer() -> Signer {
        Signer::new("quill-ak", "quill-sk", "quill")
    }

    fn decode_policy(token: &str) -> PutPolicy {
        let encoded = token.splitn(3, ':').nth(2).unwrap();
        let json = URL_SAFE.decode(encoded).unwrap();
        serde_json::from_slice(&json).unwrap()
    }

    #[test]
    fn test_base64_url_substitutes_alphabet() {
        assert_eq!(base64_url_encode([0xfb, 0xff, 0xfe]), "-__-");
        assert_eq!(base64_url_encode("quill:q/1.png"), "cXVpbGw6cS8xLnBuZw==");
    }

    #[test]
    fn test_upload_token_known_vector() {
        let token = signer().upload_token_at("q/1.png", NOW).unwrap();
        assert_eq!(
            token,
            "quill-ak:PNCSlWfxioQ0DcRud6JnU722Oo4=:\
             eyJzY29wZSI6InF1aWxsOnEvMS5wbmciLCJkZWFkbGluZSI6MTcwMDAwMzYwMH0="
        );
    }

    #[test]
    fn test_upload_token_embeds_scope_and_deadline() {
        let token = signer().upload_token_at("answers/42.jpg", NOW).unwrap();
        let policy = decode_policy(&token);
        assert_eq!(policy.scope, "quill:answers/42.jpg");
        assert_eq!(policy.deadline, NOW + 3600);
    }

    #[test]
    fn test_upload_token_is_deterministic_and_input_sensitive() {
        let s = signer();
        let a = s.upload_token_at("q/1.png", NOW).unwrap();
        assert_eq!(a, s.upload_token_at("q/1.png", NOW).unwrap());
        assert_ne!(a, s.upload_token_at("q/2.png", NOW).unwrap());

        let other_secret = Signer::new("quill-ak", "another-sk", "quill");
        assert_ne!(a, other_secret.upload_token_at("q/1.png", NOW).unwrap());
    }

    #[test]
    fn test_live_token_deadline_is_an_hour_out() {
        let before = chrono::Utc::now().timestamp();
        let policy = decode_policy(&signer().upload_token("q/1.png").unwrap());
        let after = chrono::Utc::now().timestamp();
        assert!(policy.deadline >= before + 3600 && policy.deadline <= after + 3600);
    }

    #[test]
    fn test_access_token_known_vector() {
        let token = signer().access_token("/delete/cXVpbGw6cS8xLnBuZw==").unwrap();
        assert_eq!(token, "quill-ak:fyQ1Qq4VXX31RnREF-ffltYZYOs=");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", signer());
        assert!(!rendered.contains("quill-sk"));
        assert!(rendered.contains("<redacted>"));
    }
}
