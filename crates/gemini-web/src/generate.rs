//! Request encoding and response decoding for the `StreamGenerate` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::GeminiError;

/// Identifies a position in a conversation: conversation, response and
/// response-candidate ids. All empty for a new conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMetadata {
    #[serde(default)]
    pub cid: String,
    #[serde(default)]
    pub rid: String,
    #[serde(default)]
    pub rcid: String,
}

impl ChatMetadata {
    pub fn is_new_conversation(&self) -> bool {
        self.cid.is_empty()
    }
}

/// Decoded model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelOutput {
    pub text: String,
    pub metadata: ChatMetadata,
}

/// Encode the `f.req` form field.
///
/// The endpoint expects a JSON array whose second element is itself a JSON
/// document serialized to a string.
pub fn encode_request(prompt: &str, metadata: &ChatMetadata) -> Result<String, GeminiError> {
    let inner = serde_json::json!([
        [prompt],
        null,
        [metadata.cid, metadata.rid, metadata.rcid],
    ]);
    let outer = serde_json::json!([null, serde_json::to_string(&inner)?]);
    Ok(serde_json::to_string(&outer)?)
}

/// Decode a `StreamGenerate` response body.
///
/// The body is an anti-XSSI prefix followed by length-prefixed JSON frames.
/// The first `wrb.fr` frame carrying candidates holds the reply.
pub fn decode_response(body: &str) -> Result<ModelOutput, GeminiError> {
    for line in body.lines() {
        let line = line.trim();
        if !line.starts_with('[') {
            continue;
        }

        let Ok(Value::Array(frames)) = serde_json::from_str::<Value>(line) else {
            continue;
        };

        for frame in &frames {
            if let Some(output) = decode_frame(frame)? {
                return Ok(output);
            }
        }
    }

    Err(GeminiError::Parse(
        "no reply candidates in generate response".to_string(),
    ))
}

fn decode_frame(frame: &Value) -> Result<Option<ModelOutput>, GeminiError> {
    if frame.get(0).and_then(Value::as_str) != Some("wrb.fr") {
        return Ok(None);
    }
    let Some(payload) = frame.get(2).and_then(Value::as_str) else {
        return Ok(None);
    };

    let payload: Value = serde_json::from_str(payload)?;
    let Some(candidate) = payload
        .get(4)
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
    else {
        return Ok(None);
    };

    let text = candidate
        .get(1)
        .and_then(|t| t.get(0))
        .and_then(Value::as_str)
        .ok_or_else(|| GeminiError::Parse("candidate has no text".to_string()))?;

    let ids = payload.get(1);
    let id_at = |idx: usize| {
        ids.and_then(|ids| ids.get(idx))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    Ok(Some(ModelOutput {
        text: text.to_string(),
        metadata: ChatMetadata {
            cid: id_at(0),
            rid: id_at(1),
            rcid: candidate
                .get(0)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
    }))
}
