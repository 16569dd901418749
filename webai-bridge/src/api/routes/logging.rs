//! Runtime log filter routes.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    routing::get,
};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{LoggingConfigResponse, UpdateLogFilterRequest};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_logging_config).put(update_log_filter))
}

#[utoipa::path(
    get,
    path = "/api/logging",
    tag = "logging",
    responses((status = 200, description = "Current log filter", body = LoggingConfigResponse))
)]
pub async fn get_logging_config(State(state): State<AppState>) -> Json<LoggingConfigResponse> {
    Json(LoggingConfigResponse {
        filter: state.logging.get_filter(),
    })
}

#[utoipa::path(
    put,
    path = "/api/logging",
    tag = "logging",
    request_body = UpdateLogFilterRequest,
    responses(
        (status = 200, description = "Filter applied", body = LoggingConfigResponse),
        (status = 400, description = "Invalid filter directive", body = crate::api::error::ApiErrorResponse)
    )
)]
pub async fn update_log_filter(
    State(state): State<AppState>,
    body: Result<Json<UpdateLogFilterRequest>, JsonRejection>,
) -> ApiResult<Json<LoggingConfigResponse>> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state
        .logging
        .set_filter(&request.filter)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(LoggingConfigResponse {
        filter: state.logging.get_filter(),
    }))
}
