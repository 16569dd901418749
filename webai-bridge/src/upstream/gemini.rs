//! Gemini web app adapter.
//!
//! Maps the three session cookies onto the web app's page-token handshake and
//! `StreamGenerate` call. The reissued `__Secure-1PSIDCC` cookie is reported
//! as the rotation token.

use std::time::Duration;

use async_trait::async_trait;
use gemini_web::{ChatMetadata, GeminiClient, GeminiCookies, GeminiError, PageTokens};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use super::{
    Authenticated, ConversationContext, Upstream, UpstreamError, UpstreamHandle, UpstreamReply,
    UpstreamRequest, UpstreamResult,
};
use crate::credentials::CredentialSet;

/// Session state kept between calls.
#[derive(Debug, Clone)]
struct GeminiHandle {
    tokens: PageTokens,
}

pub struct GeminiUpstream {
    client: GeminiClient,
}

impl GeminiUpstream {
    pub fn new(client: GeminiClient) -> Self {
        Self { client }
    }

    /// Adapter against the public web app with the given request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, UpstreamError> {
        let http = gemini_web::build_http_client(timeout).map_err(classify)?;
        Ok(Self::new(GeminiClient::new(http)))
    }

    /// Adapter against another host serving the same endpoints.
    pub fn with_base_url(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let http = gemini_web::build_http_client(timeout).map_err(classify)?;
        Ok(Self::new(GeminiClient::with_base_url(http, base_url)))
    }

    fn cookies(credentials: &CredentialSet) -> GeminiCookies {
        GeminiCookies::new(
            credentials.identity_token(),
            credentials.timestamp_token(),
            credentials.rotation_token(),
        )
    }
}

/// Sort a protocol error into the three upstream failure classes.
pub fn classify(err: GeminiError) -> UpstreamError {
    if err.is_auth_failure() {
        UpstreamError::Rejected(err.to_string())
    } else if err.is_transient() {
        UpstreamError::Transient(err.to_string())
    } else {
        UpstreamError::Unreachable(err.to_string())
    }
}

fn metadata_from_context(context: &ConversationContext) -> ChatMetadata {
    let field = |key: &str| context.get_str(key).unwrap_or_default().to_string();
    ChatMetadata {
        cid: field("cid"),
        rid: field("rid"),
        rcid: field("rcid"),
    }
}

fn context_from_metadata(metadata: &ChatMetadata) -> ConversationContext {
    let mut fields = Map::new();
    fields.insert("cid".into(), Value::String(metadata.cid.clone()));
    fields.insert("rid".into(), Value::String(metadata.rid.clone()));
    fields.insert("rcid".into(), Value::String(metadata.rcid.clone()));
    ConversationContext::new(fields)
}

#[async_trait]
impl Upstream for GeminiUpstream {
    fn name(&self) -> &'static str {
        "gemini"
    }

    #[instrument(skip_all)]
    async fn authenticate(
        &self,
        credentials: &CredentialSet,
    ) -> Result<Authenticated, UpstreamError> {
        let handshake = self
            .client
            .handshake(&Self::cookies(credentials))
            .await
            .map_err(classify)?;

        Ok(Authenticated {
            handle: UpstreamHandle::new(GeminiHandle {
                tokens: handshake.tokens,
            }),
            rotation_token: handshake.rotated_psidcc,
        })
    }

    #[instrument(skip_all)]
    async fn send(
        &self,
        handle: &UpstreamHandle,
        credentials: &CredentialSet,
        request: &UpstreamRequest,
    ) -> Result<UpstreamReply, UpstreamError> {
        let handle = handle
            .downcast_ref::<GeminiHandle>()
            .ok_or_else(|| UpstreamError::Unreachable("handle from another upstream".into()))?;

        let metadata = metadata_from_context(&request.context);
        debug!(
            new_conversation = metadata.is_new_conversation(),
            prompt_len = request.prompt.len(),
            "Sending prompt"
        );

        let reply = self
            .client
            .generate(
                &Self::cookies(credentials),
                &handle.tokens,
                &request.prompt,
                &metadata,
            )
            .await
            .map_err(classify)?;

        Ok(UpstreamReply {
            result: UpstreamResult {
                reply: reply.output.text,
                context: context_from_metadata(&reply.output.metadata),
            },
            rotation_token: reply.rotated_psidcc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify(GeminiError::AccessTokenMissing),
            UpstreamError::Rejected(_)
        ));
        assert!(matches!(
            classify(GeminiError::Status {
                status: 403,
                endpoint: "app"
            }),
            UpstreamError::Rejected(_)
        ));
        assert!(matches!(
            classify(GeminiError::Status {
                status: 429,
                endpoint: "generate"
            }),
            UpstreamError::Transient(_)
        ));
        assert!(matches!(
            classify(GeminiError::Status {
                status: 503,
                endpoint: "generate"
            }),
            UpstreamError::Transient(_)
        ));
        assert!(matches!(
            classify(GeminiError::Status {
                status: 400,
                endpoint: "generate"
            }),
            UpstreamError::Unreachable(_)
        ));
        assert!(matches!(
            classify(GeminiError::Parse("garbage".into())),
            UpstreamError::Unreachable(_)
        ));
    }

    #[test]
    fn test_context_metadata_mapping() {
        let metadata = ChatMetadata {
            cid: "c_1".into(),
            rid: "r_1".into(),
            rcid: "rc_1".into(),
        };
        let context = context_from_metadata(&metadata);
        assert_eq!(metadata_from_context(&context), metadata);

        // Foreign or missing fields start a new conversation.
        let empty = metadata_from_context(&ConversationContext::default());
        assert!(empty.is_new_conversation());
    }

    #[tokio::test]
    async fn test_send_rejects_foreign_handle() {
        let upstream = GeminiUpstream::with_timeout(Duration::from_secs(5)).unwrap();
        let credentials = CredentialSet::new("a", "b", "c", 5);
        let request = UpstreamRequest {
            prompt: "hi".into(),
            context: ConversationContext::default(),
        };

        let err = upstream
            .send(&UpstreamHandle::new(1u8), &credentials, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::Unreachable(_)));
    }
}
