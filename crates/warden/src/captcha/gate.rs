//! The CAPTCHA gate: challenge issue, one-shot verification, and the
//! throttling decision that ties the two together.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD};
use quill_common::constants::cache_keys::CAPTCHA_PREFIX;
use quill_common::constants::fields;
use quill_common::{CaptchaSubmission, Result, ValidationError};

use super::CaptchaGenerator;
use crate::cache::TokenCache;
use crate::throttle::RateCounter;

/// A challenge handed to the client. The phrase never leaves the cache.
#[derive(Debug, Clone)]
pub struct IssuedCaptcha {
    pub token: String,
    pub png: Vec<u8>,
}

impl IssuedCaptcha {
    /// Inline `data:` URI for embedding in JSON responses
    pub fn data_uri(&self) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(&self.png))
    }
}

pub struct CaptchaGate {
    cache: Arc<dyn TokenCache>,
    counter: Arc<dyn RateCounter>,
    generator: CaptchaGenerator,
    challenge_ttl: u64,
}

impl CaptchaGate {
    pub fn new(
        cache: Arc<dyn TokenCache>,
        counter: Arc<dyn RateCounter>,
        generator: CaptchaGenerator,
        challenge_ttl: u64,
    ) -> Self {
        Self {
            cache,
            counter,
            generator,
            challenge_ttl,
        }
    }

    /// Issue a new challenge rendered at `width` x `height`
    pub async fn generate(&self, width: u32, height: u32) -> Result<IssuedCaptcha> {
        let rendered = self.generator.generate(width, height)?;
        let token = uuid::Uuid::new_v4().to_string();

        self.cache
            .set(&cache_key(&token), &rendered.phrase, self.challenge_ttl)
            .await?;

        tracing::debug!(token = %token, width, height, "Issued CAPTCHA challenge");

        Ok(IssuedCaptcha {
            token,
            png: rendered.png,
        })
    }

    /// Verify `code` against the challenge behind `token`.
    ///
    /// The challenge is consumed before comparing, so a token is good for
    /// exactly one attempt whatever its outcome. Unknown, expired and
    /// already-used tokens all yield `false`.
    pub async fn check(&self, token: &str, code: &str) -> Result<bool> {
        let Some(expected) = self.cache.take(&cache_key(token)).await? else {
            tracing::debug!(token = %token, "CAPTCHA token unknown or already used");
            return Ok(false);
        };

        let passed = expected == code;
        tracing::debug!(token = %token, passed, "CAPTCHA checked");
        Ok(passed)
    }

    /// Record an attempt of `action` by `identity` and decide whether a
    /// captcha is needed.
    ///
    /// Returns `true` when the *next* attempt will need a captcha. Once the
    /// quota is exhausted the current attempt must itself carry a solved
    /// captcha, otherwise it fails with a validation error on
    /// `captcha_code` that also flags the captcha as required.
    pub async fn is_next_time_need(
        &self,
        identity: &str,
        action: &str,
        max_count: i64,
        period: Duration,
        submission: &CaptchaSubmission,
    ) -> Result<bool> {
        let remaining = self
            .counter
            .remaining(identity, action, max_count, period)
            .await?;
        let need_captcha = remaining <= 1;

        if remaining <= 0 {
            let passed = match submission.credentials() {
                Some((token, code)) => self.check(token, code).await?,
                None => false,
            };
            if !passed {
                tracing::info!(
                    identity = %identity,
                    action = %action,
                    remaining,
                    "Throttled action rejected without valid CAPTCHA"
                );
                return Err(ValidationError::field(fields::CAPTCHA_CODE, "invalid")
                    .with_captcha_required(need_captcha)
                    .into());
            }
        }

        Ok(need_captcha)
    }
}

fn cache_key(token: &str) -> String {
    format!("{CAPTCHA_PREFIX}{token}")
}
