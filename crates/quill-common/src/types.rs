//! Core types shared across Quill components.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Requested thumbnail dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    pub width: u32,
    pub height: u32,
}

impl ThumbnailSpec {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Named thumbnail variants, e.g. `"thumb" -> 100x100`
pub type ThumbnailSpecs = BTreeMap<String, ThumbnailSpec>;

/// Variant name -> public URL. Always contains the original under `"o"`.
pub type VariantUrls = BTreeMap<String, String>;

/// What the requesting client can render, probed from request headers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientCapabilities {
    /// Client advertised `image/webp` in its `Accept` header
    pub accepts_webp: bool,
}

impl ClientCapabilities {
    /// Probe an `Accept` header value
    pub fn from_accept(accept: Option<&str>) -> Self {
        let accepts_webp = accept.is_some_and(|value| {
            value.split(',').any(|media| {
                let mut parts = media.split(';');
                let kind = parts.next().unwrap_or_default().trim();
                let rejected = parts.any(|p| {
                    let p = p.trim();
                    p == "q=0" || p == "q=0.0" || p == "q=0.00" || p == "q=0.000"
                });
                kind.eq_ignore_ascii_case("image/webp") && !rejected
            })
        });
        Self { accepts_webp }
    }
}

/// Captcha fields pulled from the body of a gated write request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptchaSubmission {
    #[serde(default)]
    pub captcha_token: Option<String>,
    #[serde(default)]
    pub captcha_code: Option<String>,
}

impl CaptchaSubmission {
    pub fn new(token: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            captcha_token: Some(token.into()),
            captcha_code: Some(code.into()),
        }
    }

    /// Token and code, only if both are present and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.captcha_token.as_deref(), self.captcha_code.as_deref()) {
            (Some(token), Some(code)) if !token.is_empty() && !code.is_empty() => {
                Some((token, code))
            }
            _ => None,
        }
    }
}

/// CAPTCHA challenge data sent to the client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaChallenge {
    /// One-shot challenge token
    pub token: String,

    /// `data:image/png;base64,...` URI of the rendered phrase
    pub image: String,
}

/// Result of a gated action attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleDecision {
    /// The next attempt must carry a solved captcha
    pub captcha_required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_probe() {
        assert!(ClientCapabilities::from_accept(Some("image/avif,image/webp,*/*")).accepts_webp);
        assert!(ClientCapabilities::from_accept(Some("image/WebP;q=0.8")).accepts_webp);
        assert!(!ClientCapabilities::from_accept(Some("image/webp;q=0")).accepts_webp);
        assert!(!ClientCapabilities::from_accept(Some("image/png,*/*")).accepts_webp);
        assert!(!ClientCapabilities::from_accept(None).accepts_webp);
    }

    #[test]
    fn test_submission_credentials() {
        assert_eq!(
            CaptchaSubmission::new("abc", "XY12Z").credentials(),
            Some(("abc", "XY12Z"))
        );
        assert_eq!(CaptchaSubmission::new("abc", "").credentials(), None);
        assert_eq!(CaptchaSubmission::default().credentials(), None);

        let parsed: CaptchaSubmission = serde_json::from_str(r#"{"captcha_token":"t"}"#).unwrap();
        assert_eq!(parsed.credentials(), None);
    }
}
