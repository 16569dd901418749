//! REST request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::upstream::ConversationContext;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// The message to send.
    #[serde(default)]
    pub prompt: String,
    /// Context returned by a previous reply, to continue that conversation.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub conversation_context: Option<Value>,
}

/// Reply to `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: String,
    /// Pass back unchanged to continue the conversation.
    pub conversation_context: ConversationContext,
}

/// One turn of an OpenAI-style conversation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// Body of `POST /v1/chat/completions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct CompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<CompletionMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: CompletionMessage,
    pub finish_reason: String,
}

/// Non-streaming `chat.completion` object.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
}
