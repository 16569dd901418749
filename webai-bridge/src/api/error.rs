//! API error handling.
//!
//! Every error leaves the bridge as `{kind, message}` with the status its
//! kind maps to.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::session::SessionError;
use crate::translator::{ErrorKind, TranslateError};

/// Seconds suggested in `Retry-After` for retryable failures.
pub const RETRY_AFTER_SECS: u64 = 5;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// Machine-readable error kind
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

/// API error type that can be converted to HTTP responses.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub message: String,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }

    /// Create a 400 Bad Request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::InvalidRequest, message)
    }

    /// Status for an error kind.
    pub fn status_for(kind: ErrorKind) -> StatusCode {
        match kind {
            ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorKind::SessionUnavailable | ErrorKind::RetryableUpstream => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::AuthenticationRejected => StatusCode::UNAUTHORIZED,
            ErrorKind::UpstreamUnreachable => StatusCode::BAD_GATEWAY,
            ErrorKind::Cancelled => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            kind: self.kind,
            message: self.message,
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        let kind = err.kind();
        let status = Self::status_for(kind);
        let message = match &err {
            TranslateError::Invalid(msg) => msg.clone(),
            TranslateError::Session(e) => e.to_string(),
        };

        let error = Self::new(status, kind, message);
        if matches!(kind, ErrorKind::SessionUnavailable | ErrorKind::RetryableUpstream) {
            error.with_retry_after(RETRY_AFTER_SECS)
        } else {
            error
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        TranslateError::Session(err).into()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (TranslateError::Invalid("x".into()), StatusCode::BAD_REQUEST, None),
            (
                TranslateError::Session(SessionError::SessionUnavailable),
                StatusCode::SERVICE_UNAVAILABLE,
                Some(RETRY_AFTER_SECS),
            ),
            (
                TranslateError::Session(SessionError::RetryableUpstream("t".into())),
                StatusCode::SERVICE_UNAVAILABLE,
                Some(RETRY_AFTER_SECS),
            ),
            (
                TranslateError::Session(SessionError::AuthenticationRejected("a".into())),
                StatusCode::UNAUTHORIZED,
                None,
            ),
            (
                TranslateError::Session(SessionError::UpstreamUnreachable("u".into())),
                StatusCode::BAD_GATEWAY,
                None,
            ),
            (
                TranslateError::Session(SessionError::Cancelled),
                StatusCode::GATEWAY_TIMEOUT,
                None,
            ),
        ];

        for (err, status, retry_after) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status, status);
            assert_eq!(api.retry_after, retry_after);
        }
    }

    #[test]
    fn test_retry_after_header() {
        let response = ApiError::from(SessionError::SessionUnavailable).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from_static("5")
        );
    }
}
