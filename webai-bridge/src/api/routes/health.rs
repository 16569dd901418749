//! Health check routes.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::api::models::{HealthResponse, LivenessResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let session = state.client.health();
    Json(HealthResponse {
        status: if session.is_usable() { "healthy" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        session,
    })
}

/// Readiness check.
/// Returns HTTP 200 when the session is healthy or degraded, HTTP 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready"),
        (status = 503, description = "No usable session")
    )
)]
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.client.health().is_usable() && !state.client.is_closed() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses((status = 200, description = "Alive", body = LivenessResponse))
)]
pub async fn liveness_check(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
