//! REST request to upstream call translation.
//!
//! Validates inbound bodies before anything reaches the session layer, runs
//! the call, and maps the result onto the error taxonomy. Retries at most
//! once, and only for transient upstream failures.

mod types;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::context::OpContext;
use crate::session::{SessionClient, SessionError};
use crate::upstream::{ConversationContext, UpstreamRequest, UpstreamResult};

pub use types::{
    ChatRequest, ChatResponse, CompletionChoice, CompletionMessage, CompletionRequest,
    CompletionResponse,
};

/// Model name reported when a completions request names none.
pub const DEFAULT_MODEL: &str = "gemini-web";

/// Base delay before the single retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Error kinds exposed to REST callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    SessionUnavailable,
    #[serde(rename = "retryable_upstream_error")]
    RetryableUpstream,
    AuthenticationRejected,
    UpstreamUnreachable,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::SessionUnavailable => "session_unavailable",
            Self::RetryableUpstream => "retryable_upstream_error",
            Self::AuthenticationRejected => "authentication_rejected",
            Self::UpstreamUnreachable => "upstream_unreachable",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// Malformed inbound payload.
    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl TranslateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::InvalidRequest,
            Self::Session(SessionError::SessionUnavailable) => ErrorKind::SessionUnavailable,
            Self::Session(SessionError::RetryableUpstream(_)) => ErrorKind::RetryableUpstream,
            Self::Session(SessionError::AuthenticationRejected(_)) => {
                ErrorKind::AuthenticationRejected
            }
            Self::Session(SessionError::UpstreamUnreachable(_)) => ErrorKind::UpstreamUnreachable,
            Self::Session(SessionError::Cancelled) => ErrorKind::Cancelled,
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

pub struct RequestTranslator {
    client: Arc<SessionClient>,
    retry_delay: Duration,
}

impl RequestTranslator {
    pub fn new(client: Arc<SessionClient>) -> Self {
        Self {
            client,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn client(&self) -> &Arc<SessionClient> {
        &self.client
    }

    /// Handle a `/api/chat` request.
    #[instrument(skip_all)]
    pub async fn handle(
        &self,
        ctx: &OpContext,
        request: ChatRequest,
    ) -> Result<ChatResponse, TranslateError> {
        let upstream_request = chat_to_upstream(request)?;
        let result = self.call_with_retry(ctx, &upstream_request).await?;
        Ok(ChatResponse {
            reply: result.reply,
            conversation_context: result.context,
        })
    }

    /// Handle a `/v1/chat/completions` request.
    #[instrument(skip_all)]
    pub async fn complete(
        &self,
        ctx: &OpContext,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, TranslateError> {
        let prompt = completion_prompt(&request.messages)?;
        let upstream_request = UpstreamRequest {
            prompt,
            context: ConversationContext::default(),
        };
        let result = self.call_with_retry(ctx, &upstream_request).await?;

        Ok(CompletionResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            object: "chat.completion".to_string(),
            created: chrono::Utc::now().timestamp(),
            model: request
                .model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            choices: vec![CompletionChoice {
                index: 0,
                message: CompletionMessage {
                    role: "assistant".to_string(),
                    content: result.reply,
                },
                finish_reason: "stop".to_string(),
            }],
        })
    }

    async fn call_with_retry(
        &self,
        ctx: &OpContext,
        request: &UpstreamRequest,
    ) -> Result<UpstreamResult, TranslateError> {
        match self.client.call(ctx, request).await {
            Err(SessionError::RetryableUpstream(reason)) => {
                debug!(%reason, "Retrying once after transient upstream failure");
                let delay = jittered(self.retry_delay);
                if !delay.is_zero() {
                    ctx.run(tokio::time::sleep(delay))
                        .await
                        .map_err(SessionError::from)?;
                }
                Ok(self.client.call(ctx, request).await?)
            }
            other => Ok(other?),
        }
    }
}

fn jittered(base: Duration) -> Duration {
    if base.is_zero() {
        return base;
    }
    let base_ms = base.as_millis() as u64;
    let jitter = (base_ms as f64 * 0.25 * rand::random::<f64>()) as u64;
    Duration::from_millis(base_ms + jitter)
}

fn chat_to_upstream(request: ChatRequest) -> Result<UpstreamRequest, TranslateError> {
    if request.prompt.trim().is_empty() {
        return Err(TranslateError::invalid("prompt must be a non-empty string"));
    }

    let context = match request.conversation_context {
        None | Some(Value::Null) => ConversationContext::default(),
        Some(Value::Object(fields)) => ConversationContext::new(fields),
        Some(_) => {
            return Err(TranslateError::invalid(
                "conversationContext must be a JSON object",
            ));
        }
    };

    Ok(UpstreamRequest {
        prompt: request.prompt,
        context,
    })
}

/// Flatten completion messages into one prompt.
fn completion_prompt(messages: &[CompletionMessage]) -> Result<String, TranslateError> {
    let Some(last) = messages.last() else {
        return Err(TranslateError::invalid("messages must not be empty"));
    };
    if last.role != "user" {
        return Err(TranslateError::invalid("last message must have role \"user\""));
    }
    if last.content.trim().is_empty() {
        return Err(TranslateError::invalid("last message content must not be empty"));
    }

    if messages.len() == 1 {
        return Ok(last.content.clone());
    }

    Ok(messages
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n"))
}
