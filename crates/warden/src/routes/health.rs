//! Liveness and readiness probes.

use std::time::Instant;

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::config::CacheBackend;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Liveness: the process is up and serving
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    cache_backend: CacheBackend,
    cache_latency_ms: u128,
    storage: &'static str,
}

/// Readiness: the token cache answers a ping
pub async fn ready_check(
    State(state): State<AppState>,
) -> Result<Json<ReadyResponse>, StatusCode> {
    let started = Instant::now();
    if let Err(e) = state.cache.ping().await {
        tracing::warn!(error = %e, "Token cache unreachable");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(Json(ReadyResponse {
        status: "ready",
        cache_backend: state.config.cache_backend,
        cache_latency_ms: started.elapsed().as_millis(),
        storage: state.storage.name(),
    }))
}
