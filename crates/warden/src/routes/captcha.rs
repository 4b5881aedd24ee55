//! CAPTCHA generation and verification endpoints.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use quill_common::CaptchaChallenge;

use super::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChallengeQuery {
    width: Option<u32>,
    height: Option<u32>,
}

/// Generate a new CAPTCHA challenge
pub async fn get_challenge(
    State(state): State<AppState>,
    Query(params): Query<ChallengeQuery>,
) -> Result<Json<CaptchaChallenge>, ApiError> {
    let width = params.width.unwrap_or(state.config.captcha.width);
    let height = params.height.unwrap_or(state.config.captcha.height);

    let issued = state.captcha_gate.generate(width, height).await?;

    Ok(Json(CaptchaChallenge {
        image: issued.data_uri(),
        token: issued.token,
    }))
}

#[derive(Deserialize)]
pub struct CheckRequest {
    token: String,
    code: String,
}

#[derive(Serialize)]
pub struct CheckResponse {
    success: bool,
}

/// Verify a CAPTCHA answer; the token is spent either way
pub async fn check_challenge(
    State(state): State<AppState>,
    Json(payload): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, ApiError> {
    let success = state
        .captcha_gate
        .check(&payload.token, &payload.code)
        .await?;
    Ok(Json(CheckResponse { success }))
}
