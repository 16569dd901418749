//! The single owner of the live upstream session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, warn};

use super::error::SessionError;
use super::health::{HealthEvent, SessionHealth};
use super::state::Session;
use super::tracker::RefreshFailureTracker;
use crate::context::OpContext;
use crate::credentials::{CredentialSet, CredentialStore};
use crate::upstream::{Upstream, UpstreamError, UpstreamRequest, UpstreamResult};

/// Result of one [`SessionClient::refresh`].
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// A new session was installed with a different credential set.
    pub rotated: bool,
    /// The credentials now in use, when a new session was installed.
    pub new_credentials: Option<Arc<CredentialSet>>,
    /// Health of the active session afterwards.
    pub status: SessionHealth,
}

/// Owns the active [`Session`] and is the only path for authenticated calls.
///
/// The active session sits behind a narrow lock that is held only to clone or
/// swap the `Arc`; upstream I/O always runs on a per-call snapshot. Swaps are
/// serialized by `swap_lock`, which `init`, `refresh` and `close` take.
pub struct SessionClient {
    upstream: Arc<dyn Upstream>,
    store: Arc<CredentialStore>,
    active: RwLock<Arc<Session>>,
    swap_lock: tokio::sync::Mutex<()>,
    /// Last credential set the upstream refused.
    rejected: Mutex<Option<Arc<CredentialSet>>>,
    /// Replaced sessions whose handle is not released yet.
    retired: Mutex<Vec<Arc<Session>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    released: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
    refresh_failures: RefreshFailureTracker,
}

/// Decrements the in-flight counter on drop.
struct InFlight<'a>(&'a SessionClient);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl SessionClient {
    pub fn new(upstream: Arc<dyn Upstream>, store: Arc<CredentialStore>) -> Self {
        let initial = Session::uninitialized(0, store.get());
        Self {
            upstream,
            store,
            active: RwLock::new(Arc::new(initial)),
            swap_lock: tokio::sync::Mutex::new(()),
            rejected: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            released: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            refresh_failures: RefreshFailureTracker::new(),
        }
    }

    /// Health of the active session.
    pub fn health(&self) -> SessionHealth {
        self.snapshot().health()
    }

    /// The active session as of now. Later swaps do not affect it.
    pub fn snapshot(&self) -> Arc<Session> {
        Arc::clone(&self.active.read())
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn refresh_failures(&self) -> &RefreshFailureTracker {
        &self.refresh_failures
    }

    pub fn upstream_name(&self) -> &'static str {
        self.upstream.name()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of calls currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Handshake with the current credential set.
    ///
    /// On failure the active session is left as it was.
    #[instrument(skip_all, fields(upstream = self.upstream.name()))]
    pub async fn init(&self, ctx: &OpContext) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::SessionUnavailable);
        }

        let _guard = ctx.run(self.swap_lock.lock()).await?;
        if self.is_closed() {
            return Err(SessionError::SessionUnavailable);
        }

        let credentials = self.store.get();
        if self.is_rejected(&credentials) {
            return Err(SessionError::AuthenticationRejected(
                "credential set already rejected by upstream".to_string(),
            ));
        }

        let session = self.handshake(ctx, credentials).await?;
        info!(session_id = session.id(), "Upstream session established");
        let previous = self.install(session);
        self.retire(previous);
        self.release_retired(false).await;
        Ok(())
    }

    /// Send one request over the active session.
    ///
    /// Fails fast with [`SessionError::SessionUnavailable`] when there is no
    /// healthy or degraded session. A cancelled call never touches the store.
    #[instrument(skip_all)]
    pub async fn call(
        &self,
        ctx: &OpContext,
        request: &UpstreamRequest,
    ) -> Result<UpstreamResult, SessionError> {
        let _in_flight = self.enter();

        if self.is_closed() {
            return Err(SessionError::SessionUnavailable);
        }
        if ctx.is_done() {
            debug!("Call cancelled before start");
            return Err(SessionError::Cancelled);
        }

        let session = self.snapshot();
        if !session.health().is_usable() {
            debug!(health = %session.health(), "No usable session");
            return Err(SessionError::SessionUnavailable);
        }
        let Some(handle) = session.handle() else {
            return Err(SessionError::SessionUnavailable);
        };

        let outcome = ctx
            .run(self.upstream.send(handle, session.credentials(), request))
            .await;

        match outcome {
            Err(_) => {
                debug!(session_id = session.id(), "Call cancelled");
                Err(SessionError::Cancelled)
            }
            Ok(Ok(reply)) => {
                session.record(HealthEvent::CallSucceeded);
                if let Some(token) = reply.rotation_token.as_deref() {
                    self.store.update(token);
                }
                Ok(reply.result)
            }
            Ok(Err(err)) => {
                let event = match err {
                    UpstreamError::Rejected(_) => {
                        self.mark_rejected_after_call(session.credentials());
                        HealthEvent::UnrecoverableFailure
                    }
                    UpstreamError::Transient(_) | UpstreamError::Unreachable(_) => {
                        HealthEvent::RecoverableFailure
                    }
                };
                let health = session.record(event);
                warn!(
                    session_id = session.id(),
                    health = %health,
                    error = %err,
                    "Upstream call failed"
                );
                Err(err.into())
            }
        }
    }

    /// Re-derive credentials from the store and re-handshake when needed.
    ///
    /// Handshake failures are reported through [`RefreshOutcome::status`];
    /// the error side is only `Cancelled` or `SessionUnavailable` once closed.
    #[instrument(skip_all)]
    pub async fn refresh(&self, ctx: &OpContext) -> Result<RefreshOutcome, SessionError> {
        if self.is_closed() {
            return Err(SessionError::SessionUnavailable);
        }

        let _guard = ctx.run(self.swap_lock.lock()).await?;
        if self.is_closed() {
            return Err(SessionError::SessionUnavailable);
        }

        let current = self.snapshot();
        let credentials = self.store.get();
        let unchanged = current.credentials().same_secrets(&credentials);

        if unchanged && current.health() == SessionHealth::Healthy {
            debug!(session_id = current.id(), "Credentials unchanged, session healthy");
            self.refresh_failures.clear();
            drop(current);
            self.release_retired(false).await;
            return Ok(RefreshOutcome {
                rotated: false,
                new_credentials: None,
                status: SessionHealth::Healthy,
            });
        }

        if self.is_rejected(&credentials) {
            debug!(
                health = %current.health(),
                "Skipping refresh with a credential set the upstream already rejected"
            );
            return Ok(RefreshOutcome {
                rotated: false,
                new_credentials: None,
                status: current.health(),
            });
        }

        match self.handshake(ctx, credentials).await {
            Ok(session) => {
                let rotated = !current.credentials().same_secrets(session.credentials());
                let new_credentials = Arc::clone(session.credentials());
                info!(
                    previous_session_id = current.id(),
                    session_id = session.id(),
                    rotated,
                    "Session refreshed"
                );
                let previous = self.install(session);
                drop(current);
                self.retire(previous);
                self.release_retired(false).await;
                self.refresh_failures.clear();
                Ok(RefreshOutcome {
                    rotated,
                    new_credentials: Some(new_credentials),
                    status: SessionHealth::Healthy,
                })
            }
            Err(SessionError::Cancelled) => Err(SessionError::Cancelled),
            Err(err) => {
                // A failure with a different set says nothing about the one
                // the active session still uses.
                let status = if unchanged {
                    let event = match err {
                        SessionError::AuthenticationRejected(_) => {
                            HealthEvent::UnrecoverableFailure
                        }
                        _ => HealthEvent::RecoverableFailure,
                    };
                    current.record(event)
                } else {
                    current.health()
                };

                let failure_count = self.refresh_failures.record_failure(&err.to_string());
                if RefreshFailureTracker::should_escalate(failure_count) {
                    error!(
                        failure_count,
                        health = %status,
                        error = %err,
                        "Session refresh failed"
                    );
                } else {
                    warn!(
                        failure_count,
                        health = %status,
                        error = %err,
                        "Session refresh failed"
                    );
                }

                Ok(RefreshOutcome {
                    rotated: false,
                    new_credentials: None,
                    status,
                })
            }
        }
    }

    /// Wait until no call is in flight, up to `grace`.
    ///
    /// Returns `false` if calls were still running when the grace period ran
    /// out.
    pub async fn drain(&self, grace: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(grace, wait).await.is_ok()
    }

    /// Release the upstream handle. Idempotent.
    ///
    /// Calls made afterwards fail with `SessionUnavailable`.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        let _guard = self.swap_lock.lock().await;
        let previous = {
            let mut active = self.active.write();
            let placeholder = Session::uninitialized(
                self.next_id.fetch_add(1, Ordering::SeqCst),
                Arc::clone(active.credentials()),
            );
            std::mem::replace(&mut *active, Arc::new(placeholder))
        };

        let session_id = previous.id();
        self.retire(previous);
        self.release_retired(true).await;
        info!(session_id, "Session client closed");
    }

    /// Refuse new calls, let running ones finish within `grace`, then close.
    ///
    /// Returns `false` if the grace period expired with calls still running.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.closed.store(true, Ordering::SeqCst);
        let drained = self.drain(grace).await;
        if !drained {
            warn!(
                in_flight = self.in_flight(),
                "Grace period expired with calls still running"
            );
        }
        self.close().await;
        drained
    }

    fn enter(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlight(self)
    }

    /// Swap in `session` and hand back the one it replaces.
    fn install(&self, session: Session) -> Arc<Session> {
        std::mem::replace(&mut *self.active.write(), Arc::new(session))
    }

    fn retire(&self, previous: Arc<Session>) {
        if previous.handle().is_some() {
            self.retired.lock().push(previous);
        }
    }

    /// Release the handles of replaced sessions.
    ///
    /// A session still captured by a running call keeps its handle until a
    /// later sweep, unless `force` is set.
    async fn release_retired(&self, force: bool) {
        let ready: Vec<Arc<Session>> = {
            let mut retired = self.retired.lock();
            let (ready, busy): (Vec<_>, Vec<_>) = std::mem::take(&mut *retired)
                .into_iter()
                .partition(|session| force || Arc::strong_count(session) == 1);
            *retired = busy;
            ready
        };

        for session in ready {
            if let Some(handle) = session.handle() {
                self.upstream.release(handle).await;
                debug!(session_id = session.id(), "Released upstream handle");
            }
        }
    }

    /// Remember the set a call was refused with. A stored set that differs
    /// only by a rotation token counts as the same identity.
    fn mark_rejected_after_call(&self, used: &Arc<CredentialSet>) {
        let stored = self.store.get();
        let rejected = if stored.identity_token() == used.identity_token()
            && stored.timestamp_token() == used.timestamp_token()
        {
            stored
        } else {
            Arc::clone(used)
        };
        *self.rejected.lock() = Some(rejected);
    }

    fn is_rejected(&self, credentials: &CredentialSet) -> bool {
        self.rejected
            .lock()
            .as_ref()
            .is_some_and(|rejected| rejected.same_secrets(credentials))
    }

    /// Authenticate with `credentials` and build the session to install.
    ///
    /// A rotation token issued by the handshake is folded into the new
    /// session's credentials and written to the store.
    async fn handshake(
        &self,
        ctx: &OpContext,
        credentials: Arc<CredentialSet>,
    ) -> Result<Session, SessionError> {
        let missing = credentials.missing_tokens();
        if !missing.is_empty() {
            *self.rejected.lock() = Some(Arc::clone(&credentials));
            return Err(SessionError::AuthenticationRejected(format!(
                "credential set incomplete, missing {}",
                missing.join(", ")
            )));
        }

        match ctx.run(self.upstream.authenticate(&credentials)).await? {
            Ok(authenticated) => {
                let credentials = match authenticated.rotation_token.as_deref().map(str::trim) {
                    Some(token) if !token.is_empty() && token != credentials.rotation_token() => {
                        self.store.update(token);
                        Arc::new(credentials.with_rotation_token(token))
                    }
                    _ => credentials,
                };
                self.rejected.lock().take();
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                Ok(Session::established(id, credentials, authenticated.handle))
            }
            Err(err) => {
                if matches!(err, UpstreamError::Rejected(_)) {
                    *self.rejected.lock() = Some(credentials);
                }
                warn!(upstream = self.upstream.name(), error = %err, "Handshake failed");
                Err(err.into())
            }
        }
    }
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("upstream", &self.upstream.name())
            .field("active", &self.snapshot())
            .field("closed", &self.is_closed())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
