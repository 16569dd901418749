//! Chat route.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::translator::{ChatRequest, ChatResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(chat))
}

/// Send a prompt through the upstream session.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Upstream reply", body = ChatResponse),
        (status = 400, description = "Malformed request", body = crate::api::error::ApiErrorResponse),
        (status = 401, description = "Credentials rejected upstream", body = crate::api::error::ApiErrorResponse),
        (status = 502, description = "Upstream unreachable", body = crate::api::error::ApiErrorResponse),
        (status = 503, description = "No usable session or transient failure", body = crate::api::error::ApiErrorResponse),
        (status = 504, description = "Deadline exceeded", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatResponse>> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let ctx = state.request_context();
    let response = state.translator.handle(&ctx, request).await?;
    Ok(Json(response))
}
