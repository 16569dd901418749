use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};

use super::health::{HealthEvent, SessionHealth};
use crate::credentials::CredentialSet;
use crate::upstream::UpstreamHandle;

/// One authenticated handle to the upstream.
///
/// Credentials and handle never change after construction; only the health
/// moves. A new credential set always means a new `Session`.
#[derive(Debug)]
pub struct Session {
    id: u64,
    credentials: Arc<CredentialSet>,
    handle: Option<UpstreamHandle>,
    established_at: Option<DateTime<Utc>>,
    health: AtomicU8,
}

impl Session {
    /// Placeholder before any handshake succeeded.
    pub(crate) fn uninitialized(id: u64, credentials: Arc<CredentialSet>) -> Self {
        Self {
            id,
            credentials,
            handle: None,
            established_at: None,
            health: AtomicU8::new(SessionHealth::Uninitialized.as_u8()),
        }
    }

    /// Session after a successful handshake.
    pub(crate) fn established(
        id: u64,
        credentials: Arc<CredentialSet>,
        handle: UpstreamHandle,
    ) -> Self {
        let session = Self {
            id,
            credentials,
            handle: Some(handle),
            established_at: Some(Utc::now()),
            health: AtomicU8::new(SessionHealth::Uninitialized.as_u8()),
        };
        session.record(HealthEvent::HandshakeSucceeded);
        session
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn credentials(&self) -> &Arc<CredentialSet> {
        &self.credentials
    }

    pub fn handle(&self) -> Option<&UpstreamHandle> {
        self.handle.as_ref()
    }

    pub fn established_at(&self) -> Option<DateTime<Utc>> {
        self.established_at
    }

    pub fn health(&self) -> SessionHealth {
        SessionHealth::from_u8(self.health.load(Ordering::Acquire))
    }

    /// Apply `event` and return the resulting health.
    ///
    /// Events that do not apply in the current state leave it unchanged.
    pub(crate) fn record(&self, event: HealthEvent) -> SessionHealth {
        let mut current = self.health.load(Ordering::Acquire);
        loop {
            let state = SessionHealth::from_u8(current);
            let Some(next) = state.next(event) else {
                return state;
            };
            if next == state {
                return state;
            }
            match self.health.compare_exchange_weak(
                current,
                next.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }
}
