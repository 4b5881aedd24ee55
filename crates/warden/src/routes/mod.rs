//! HTTP route handlers for Warden.

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use quill_common::{QuillError, ValidationError};

use crate::state::AppState;

mod actions;
mod captcha;
mod files;
mod health;

/// Largest accepted upload
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // CAPTCHA endpoints
        .route("/captcha", get(captcha::get_challenge))
        .route("/captcha/check", post(captcha::check_challenge))

        // Throttled write actions
        .route("/actions/{action}", post(actions::attempt_action))

        // Image storage
        .route(
            "/files/{*path}",
            get(files::get_urls)
                .put(files::put_file)
                .delete(files::delete_file),
        )

        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )

        // Add shared state
        .with_state(state)
}

/// Error returned by handlers, rendered from the error's status code.
/// Validation failures keep their field map and captcha flag.
pub struct ApiError(QuillError);

impl From<QuillError> for ApiError {
    fn from(err: QuillError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }

        match self.0 {
            QuillError::Validation(validation) => (status, Json(validation)).into_response(),
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
