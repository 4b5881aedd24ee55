//! Common error types for Quill components.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field-level validation failure.
///
/// Carries one human-readable message per offending request field. The
/// captcha gate additionally sets `captcha_required` so the caller knows
/// whether a captcha widget must be shown on the next attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub errors: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captcha_required: Option<bool>,
}

impl ValidationError {
    /// Single-field validation error
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(name.into(), message.into());
        Self {
            errors,
            captcha_required: None,
        }
    }

    pub fn with_captcha_required(mut self, required: bool) -> Self {
        self.captcha_required = Some(required);
        self
    }

    pub fn message(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.errors {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Common errors across Quill components
#[derive(Debug, Error)]
pub enum QuillError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token cache / rate counter backend error
    #[error("Cache error: {0}")]
    Cache(String),

    /// CAPTCHA rendering error
    #[error("CAPTCHA error: {0}")]
    Captcha(String),

    /// User-correctable input problem
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Caller is not allowed to perform the action
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Remote storage provider rejected or failed the operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuillError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config(_) => 500,
            Self::Cache(_) => 503,
            Self::Captcha(_) => 500,
            Self::Validation(_) => 422,
            Self::Permission(_) => 403,
            Self::Storage(_) => 502,
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Cache(_))
    }

    /// Validation details, if this is a validation failure
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(v) => Some(v),
            _ => None,
        }
    }
}
