//! Shared constants for Quill components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Default Warden HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8888";

/// CAPTCHA challenge expiry in the token cache (1 hour)
pub const CAPTCHA_TTL_SECS: u64 = 3600;

/// Default CAPTCHA image width in pixels
pub const DEFAULT_CAPTCHA_WIDTH: u32 = 100;

/// Default CAPTCHA image height in pixels
pub const DEFAULT_CAPTCHA_HEIGHT: u32 = 36;

/// Largest CAPTCHA image a client may request
pub const MAX_CAPTCHA_WIDTH: u32 = 400;
pub const MAX_CAPTCHA_HEIGHT: u32 = 200;

/// Default number of characters in a CAPTCHA phrase
pub const DEFAULT_PHRASE_LENGTH: usize = 5;

/// Upload token validity (1 hour, enforced by the provider)
pub const UPLOAD_TOKEN_TTL_SECS: i64 = 3600;

/// Default throttle: attempts allowed per period
pub const DEFAULT_THROTTLE_MAX_COUNT: i64 = 5;

/// Default throttle period in seconds (1 hour)
pub const DEFAULT_THROTTLE_PERIOD_SECS: u64 = 3600;

/// Key prefixes in the token cache and rate counter
pub mod cache_keys {
    /// CAPTCHA challenge: captcha_{token}
    pub const CAPTCHA_PREFIX: &str = "captcha_";

    /// Throttle counters: throttle:{action}:{identity}
    pub const THROTTLE_PREFIX: &str = "throttle:";
}

/// Request field names understood by the captcha gate
pub mod fields {
    pub const CAPTCHA_TOKEN: &str = "captcha_token";
    pub const CAPTCHA_CODE: &str = "captcha_code";
}

/// Name of the original (untransformed) variant in a URL map
pub const ORIGINAL_VARIANT: &str = "o";

/// Provider error code meaning the object does not exist
pub const QINIU_NO_SUCH_ENTRY: u16 = 612;
