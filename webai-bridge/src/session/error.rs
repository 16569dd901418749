//! Session error taxonomy.

use thiserror::Error;

use crate::context::Cancelled;
use crate::upstream::UpstreamError;

/// Errors returned by [`SessionClient`](super::SessionClient) operations.
///
/// This set is closed: upstream failures are always mapped onto one of
/// these variants before leaving the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No healthy or degraded session, or the client is closed.
    #[error("no usable upstream session")]
    SessionUnavailable,

    /// Transient upstream or network failure.
    #[error("upstream temporarily unavailable: {0}")]
    RetryableUpstream(String),

    /// The upstream refused the credential set.
    #[error("upstream rejected the session credentials: {0}")]
    AuthenticationRejected(String),

    /// The upstream could not be reached or answered with something unusable.
    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// Cancelled by the caller or past its deadline.
    #[error("operation cancelled")]
    Cancelled,
}

impl SessionError {
    /// Whether the caller may retry later with the same credentials.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SessionUnavailable | Self::RetryableUpstream(_))
    }
}

impl From<Cancelled> for SessionError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<UpstreamError> for SessionError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Rejected(msg) => Self::AuthenticationRejected(msg),
            UpstreamError::Transient(msg) => Self::RetryableUpstream(msg),
            UpstreamError::Unreachable(msg) => Self::UpstreamUnreachable(msg),
        }
    }
}
