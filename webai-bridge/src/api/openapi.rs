//! OpenAPI documentation, served at `/api-docs/openapi.json` with Swagger UI
//! at `/swagger-ui`.

use utoipa::OpenApi;

use crate::api::error::ApiErrorResponse;
use crate::api::models::{
    HealthResponse, LivenessResponse, LoggingConfigResponse, SessionStatusResponse,
    UpdateLogFilterRequest,
};
use crate::credentials::MaskedCredentials;
use crate::session::SessionHealth;
use crate::translator::{
    ChatRequest, ChatResponse, CompletionChoice, CompletionMessage, CompletionRequest,
    CompletionResponse, ErrorKind,
};
use crate::upstream::ConversationContext;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "webai-bridge API",
        version = "0.1.0",
        description = "REST bridge over a cookie-authenticated Gemini web session.",
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "chat", description = "Chat endpoints"),
        (name = "session", description = "Upstream session status"),
        (name = "health", description = "Health check endpoints for monitoring and orchestration"),
        (name = "logging", description = "Logging configuration endpoints")
    ),
    paths(
        crate::api::routes::chat::chat,
        crate::api::routes::completions::create_completion,
        crate::api::routes::session::session_status,
        crate::api::routes::health::health_check,
        crate::api::routes::health::readiness_check,
        crate::api::routes::health::liveness_check,
        crate::api::routes::logging::get_logging_config,
        crate::api::routes::logging::update_log_filter,
    ),
    components(schemas(
        ApiErrorResponse,
        ErrorKind,
        ChatRequest,
        ChatResponse,
        ConversationContext,
        CompletionRequest,
        CompletionResponse,
        CompletionMessage,
        CompletionChoice,
        SessionStatusResponse,
        SessionHealth,
        MaskedCredentials,
        HealthResponse,
        LivenessResponse,
        LoggingConfigResponse,
        UpdateLogFilterRequest,
    ))
)]
pub struct ApiDoc;
