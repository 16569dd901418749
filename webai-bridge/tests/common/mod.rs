//! In-process fake upstream shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use webai_bridge::credentials::{CredentialSet, CredentialStore};
use webai_bridge::session::SessionClient;
use webai_bridge::upstream::{
    Authenticated, ConversationContext, Upstream, UpstreamError, UpstreamHandle, UpstreamReply,
    UpstreamRequest, UpstreamResult,
};

/// What the fake hands out as its session handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeHandle {
    pub handshake: usize,
    pub identity: String,
}

/// One served call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub handshake: usize,
    pub handle_identity: String,
    pub credential_identity: String,
}

/// Fake upstream.
///
/// Rejects any identity token listed in `rejected`. `slow_failure` makes the
/// n-th send (1-based) sleep and then fail transiently.
#[derive(Default)]
pub struct FakeUpstream {
    pub rejected: Mutex<HashSet<String>>,
    pub handshakes: AtomicUsize,
    pub sends: AtomicUsize,
    pub releases: AtomicUsize,
    pub served: Mutex<Vec<Served>>,
    pub slow_failure: Mutex<Option<(usize, Duration)>>,
    pub send_delay: Mutex<Duration>,
}

impl FakeUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rejecting(identity: &str) -> Arc<Self> {
        let upstream = Self::default();
        upstream.rejected.lock().insert(identity.to_string());
        Arc::new(upstream)
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn authenticate(
        &self,
        credentials: &CredentialSet,
    ) -> Result<Authenticated, UpstreamError> {
        let handshake = self.handshakes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.rejected.lock().contains(credentials.identity_token()) {
            return Err(UpstreamError::Rejected("cookie no longer valid".into()));
        }
        Ok(Authenticated {
            handle: UpstreamHandle::new(FakeHandle {
                handshake,
                identity: credentials.identity_token().to_string(),
            }),
            rotation_token: None,
        })
    }

    async fn send(
        &self,
        handle: &UpstreamHandle,
        credentials: &CredentialSet,
        request: &UpstreamRequest,
    ) -> Result<UpstreamReply, UpstreamError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = handle
            .downcast_ref::<FakeHandle>()
            .ok_or_else(|| UpstreamError::Unreachable("foreign handle".into()))?
            .clone();

        let slow_failure = *self.slow_failure.lock();
        if let Some((nth, delay)) = slow_failure
            && nth == n
        {
            tokio::time::sleep(delay).await;
            return Err(UpstreamError::Transient("request timed out".into()));
        }

        let delay = *self.send_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.served.lock().push(Served {
            handshake: handle.handshake,
            handle_identity: handle.identity.clone(),
            credential_identity: credentials.identity_token().to_string(),
        });

        let mut context = Map::new();
        context.insert("cid".into(), Value::String(format!("c_{}", handle.handshake)));
        Ok(UpstreamReply {
            result: UpstreamResult {
                reply: format!("reply to {}", request.prompt),
                context: ConversationContext::new(context),
            },
            rotation_token: None,
        })
    }

    async fn release(&self, _handle: &UpstreamHandle) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn credentials(identity: &str) -> CredentialSet {
    CredentialSet::new(identity, "b", "c", 5)
}

pub fn client(upstream: Arc<FakeUpstream>, credentials: CredentialSet) -> Arc<SessionClient> {
    Arc::new(SessionClient::new(
        upstream,
        Arc::new(CredentialStore::new(credentials)),
    ))
}

pub fn prompt(text: &str) -> UpstreamRequest {
    UpstreamRequest {
        prompt: text.to_string(),
        context: ConversationContext::default(),
    }
}
