//! API response and request bodies that are not part of the chat surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::credentials::MaskedCredentials;
use crate::session::SessionHealth;

/// Overall service health.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// "healthy" when the session is usable, else "unhealthy"
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub session: SessionHealth,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LivenessResponse {
    /// Always "alive" if responding
    pub status: String,
    pub uptime_secs: u64,
}

/// State of the upstream session.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionStatusResponse {
    pub health: SessionHealth,
    pub session_id: u64,
    pub upstream: String,
    pub established_at: Option<DateTime<Utc>>,
    /// Credentials currently in the store, masked.
    pub credentials: MaskedCredentials,
    pub refresh_interval_minutes: u32,
    pub consecutive_refresh_failures: u32,
    pub last_refresh_error: Option<String>,
    pub last_refresh_failure_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoggingConfigResponse {
    /// Current filter directive
    pub filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateLogFilterRequest {
    /// New filter directive (e.g. "webai_bridge=debug,gemini_web=info")
    pub filter: String,
}
