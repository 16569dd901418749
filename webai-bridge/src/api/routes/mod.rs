//! API route modules.

pub mod chat;
pub mod completions;
pub mod health;
pub mod logging;
pub mod session;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;
use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/chat", chat::router())
        .nest("/v1/chat", completions::router())
        .nest("/api/session", session::router())
        .nest("/api/logging", logging::router())
        .nest("/health", health::router())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}
