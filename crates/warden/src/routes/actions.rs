//! Throttled write actions (posting questions, answers, comments, ...).
//!
//! Handlers for the actual content live elsewhere; they call this endpoint
//! first and only proceed on success.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;

use quill_common::{CaptchaSubmission, ThrottleDecision, ValidationError};

use super::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ActionRequest {
    /// Who is acting: user id, or client address for anonymous visitors
    identity: String,

    #[serde(flatten)]
    captcha: CaptchaSubmission,
}

/// Record one attempt of `action` and apply the captcha gate
pub async fn attempt_action(
    State(state): State<AppState>,
    Path(action): Path<String>,
    Json(payload): Json<ActionRequest>,
) -> Result<Json<ThrottleDecision>, ApiError> {
    let identity = payload.identity.trim();
    if identity.is_empty() {
        return Err(ValidationError::field("identity", "required").into());
    }

    let rule = state.config.throttle.rule_for(&action);
    let captcha_required = state
        .captcha_gate
        .is_next_time_need(identity, &action, rule.max_count, rule.period(), &payload.captcha)
        .await?;

    Ok(Json(ThrottleDecision { captcha_required }))
}
