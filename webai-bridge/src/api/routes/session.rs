//! Session status route.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::models::SessionStatusResponse;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(session_status))
}

/// Health, identity and refresh history of the active session.
#[utoipa::path(
    get,
    path = "/api/session",
    tag = "session",
    responses((status = 200, description = "Session status", body = SessionStatusResponse))
)]
pub async fn session_status(State(state): State<AppState>) -> Json<SessionStatusResponse> {
    let session = state.client.snapshot();
    let credentials = state.client.store().get();
    let failures = state.client.refresh_failures().failure_info();

    Json(SessionStatusResponse {
        health: session.health(),
        session_id: session.id(),
        upstream: state.client.upstream_name().to_string(),
        established_at: session.established_at(),
        credentials: credentials.masked(),
        refresh_interval_minutes: credentials.refresh_interval_minutes(),
        consecutive_refresh_failures: failures.as_ref().map(|f| f.count).unwrap_or(0),
        last_refresh_error: failures.as_ref().map(|f| f.last_error.clone()),
        last_refresh_failure_at: failures.as_ref().map(|f| f.last_failure),
    })
}
