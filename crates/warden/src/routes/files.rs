//! Image upload, URL lookup, and removal.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::ACCEPT},
};

use quill_common::{ClientCapabilities, ValidationError, VariantUrls};

use super::ApiError;
use crate::state::AppState;

fn client_capabilities(headers: &HeaderMap) -> ClientCapabilities {
    ClientCapabilities::from_accept(headers.get(ACCEPT).and_then(|v| v.to_str().ok()))
}

/// URLs for the original and every configured thumbnail
pub async fn get_urls(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Json<VariantUrls> {
    Json(
        state
            .storage
            .get(&path, &state.config.thumbnails, client_capabilities(&headers)),
    )
}

/// Store the request body at `path`
pub async fn put_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<VariantUrls>), ApiError> {
    if body.is_empty() {
        return Err(ValidationError::field("file", "required").into());
    }

    let thumbnails = &state.config.thumbnails;
    state.storage.write(&path, body.to_vec(), thumbnails).await?;

    let urls = state
        .storage
        .get(&path, thumbnails, client_capabilities(&headers));
    Ok((StatusCode::CREATED, Json(urls)))
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .storage
        .delete(&path, &state.config.thumbnails)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
