//! # Quill Common
//!
//! Shared types, errors, and constants used across Quill components.
//!
//! ## Modules
//! - `types` - Core data structures (ThumbnailSpec, CaptchaSubmission, etc.)
//! - `error` - Common error types
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::{QuillError, ValidationError};
pub use types::*;

/// Result alias used by Quill libraries
pub type Result<T, E = QuillError> = std::result::Result<T, E>;
