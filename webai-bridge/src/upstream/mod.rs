//! Upstream capability boundary.
//!
//! The web service has no documented protocol, so the session layer only sees
//! three capabilities: authenticate with a credential set, send a prompt, and
//! hand back a rotated token when the service issues one. Everything
//! wire-specific lives behind [`Upstream`].

pub mod gemini;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use utoipa::ToSchema;

use crate::credentials::CredentialSet;

pub use gemini::GeminiUpstream;

/// Opaque per-session state produced by [`Upstream::authenticate`].
#[derive(Clone)]
pub struct UpstreamHandle(Arc<dyn Any + Send + Sync>);

impl UpstreamHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for UpstreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("UpstreamHandle(..)")
    }
}

/// Conversation state round-tripped through clients without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ConversationContext(Map<String, Value>);

impl ConversationContext {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// One prompt bound for the upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub prompt: String,
    pub context: ConversationContext,
}

/// Normalized upstream reply.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResult {
    pub reply: String,
    pub context: ConversationContext,
}

/// Successful handshake.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub handle: UpstreamHandle,
    /// Rotation token issued during the handshake, if any.
    pub rotation_token: Option<String>,
}

/// Successful send.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub result: UpstreamResult,
    /// Rotation token issued with this reply, if any.
    pub rotation_token: Option<String>,
}

/// Upstream failure, already classified by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The service refused the credentials.
    #[error("credentials rejected: {0}")]
    Rejected(String),
    /// Timeouts, rate limiting, server errors.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Could not connect, or the answer was not usable.
    #[error("unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Establish a session with `credentials`.
    async fn authenticate(&self, credentials: &CredentialSet)
    -> Result<Authenticated, UpstreamError>;

    /// Send one request over an established session.
    async fn send(
        &self,
        handle: &UpstreamHandle,
        credentials: &CredentialSet,
        request: &UpstreamRequest,
    ) -> Result<UpstreamReply, UpstreamError>;

    /// Release whatever `handle` holds. Called once per handle, after its
    /// session is replaced and no call still uses it, or on close.
    async fn release(&self, _handle: &UpstreamHandle) {}
}
