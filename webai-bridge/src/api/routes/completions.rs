//! OpenAI-style chat completions (non-streaming).

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::post,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::translator::{CompletionRequest, CompletionResponse};

pub fn router() -> Router<AppState> {
    Router::new().route("/completions", post(create_completion))
}

#[utoipa::path(
    post,
    path = "/v1/chat/completions",
    tag = "chat",
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Completion", body = CompletionResponse),
        (status = 400, description = "Malformed request", body = crate::api::error::ApiErrorResponse),
        (status = 401, description = "Credentials rejected upstream", body = crate::api::error::ApiErrorResponse),
        (status = 502, description = "Upstream unreachable", body = crate::api::error::ApiErrorResponse),
        (status = 503, description = "No usable session or transient failure", body = crate::api::error::ApiErrorResponse),
        (status = 504, description = "Deadline exceeded", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn create_completion(
    State(state): State<AppState>,
    body: Result<Json<CompletionRequest>, JsonRejection>,
) -> ApiResult<Json<CompletionResponse>> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let ctx = state.request_context();
    let response = state.translator.complete(&ctx, request).await?;
    Ok(Json(response))
}
