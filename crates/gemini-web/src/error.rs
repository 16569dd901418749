use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected http status {status} from {endpoint}")]
    Status { status: u16, endpoint: &'static str },
    #[error("access token not found in app page (cookies rejected or expired)")]
    AccessTokenMissing,
    #[error("missing cookie: {0}")]
    MissingCookie(&'static str),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeminiError {
    /// The upstream refused the cookies themselves.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::AccessTokenMissing | Self::MissingCookie(_) => true,
            Self::Status { status, .. } => matches!(status, 401 | 403),
            _ => false,
        }
    }

    /// A later attempt with the same cookies may succeed.
    ///
    /// Connection failures are not transient: the host could not be reached
    /// at all.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) if e.is_connect() => false,
            Self::Network(e) => e.is_timeout() || e.is_request() || e.is_body(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
