//! Periodic session refresh.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::Clock;
use crate::context::OpContext;
use crate::session::{SessionClient, SessionError};

/// Drives [`SessionClient::refresh`] on the interval configured in the
/// credential store, independent of traffic.
///
/// Ticks never overlap: a tick that fires while the previous refresh is still
/// running is skipped. Failures are logged and do not stop later ticks.
pub struct RefreshScheduler {
    client: Arc<SessionClient>,
    clock: Arc<dyn Clock>,
    tick_timeout: Duration,
    cancel: CancellationToken,
    stopped: Mutex<bool>,
    busy: Arc<AtomicBool>,
    current: Mutex<Option<JoinHandle<()>>>,
    ticks_started: AtomicU64,
    ticks_skipped: AtomicU64,
}

impl RefreshScheduler {
    /// `tick_timeout` bounds each refresh.
    pub fn new(client: Arc<SessionClient>, clock: Arc<dyn Clock>, tick_timeout: Duration) -> Self {
        Self {
            client,
            clock,
            tick_timeout,
            cancel: CancellationToken::new(),
            stopped: Mutex::new(false),
            busy: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
            ticks_started: AtomicU64::new(0),
            ticks_skipped: AtomicU64::new(0),
        }
    }

    /// Start the timer loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            info!("Refresh scheduler started");
            scheduler.run_loop().await;
            info!("Refresh scheduler stopped");
        })
    }

    /// No tick starts after this returns. A tick in progress keeps running.
    pub fn stop(&self) {
        let mut stopped = self.stopped.lock();
        *stopped = true;
        self.cancel.cancel();
    }

    /// Stop, then wait up to `grace` for the tick in progress.
    ///
    /// Returns `false` if that tick was still running when `grace` ran out.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.stop();
        let Some(handle) = self.current.lock().take() else {
            return true;
        };
        match tokio::time::timeout(grace, handle).await {
            Ok(_) => true,
            Err(_) => {
                warn!("Refresh still running after grace period");
                false
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    pub fn ticks_started(&self) -> u64 {
        self.ticks_started.load(Ordering::SeqCst)
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped.load(Ordering::SeqCst)
    }

    async fn run_loop(&self) {
        loop {
            // Re-read each round so a reloaded interval takes effect.
            let interval = self.client.store().get().refresh_interval();
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.clock.sleep(interval) => {}
            }
            if !self.tick() {
                break;
            }
        }
    }

    /// Start one refresh unless stopped or busy. Returns `false` once stopped.
    fn tick(&self) -> bool {
        let stopped = self.stopped.lock();
        if *stopped {
            return false;
        }

        if self.busy.swap(true, Ordering::SeqCst) {
            self.ticks_skipped.fetch_add(1, Ordering::SeqCst);
            debug!("Previous refresh still running, skipping tick");
            return true;
        }
        self.ticks_started.fetch_add(1, Ordering::SeqCst);

        let client = Arc::clone(&self.client);
        let clock = Arc::clone(&self.clock);
        let busy = Arc::clone(&self.busy);
        let ctx = OpContext::with_timeout(self.tick_timeout);
        let handle = tokio::spawn(async move {
            let started = clock.now();
            match client.refresh(&ctx).await {
                Ok(outcome) => debug!(
                    rotated = outcome.rotated,
                    status = %outcome.status,
                    elapsed_ms = (clock.now() - started).as_millis() as u64,
                    "Refresh tick finished"
                ),
                Err(SessionError::Cancelled) => debug!("Refresh tick timed out"),
                Err(e) => debug!(error = %e, "Refresh tick skipped"),
            }
            busy.store(false, Ordering::SeqCst);
        });
        *self.current.lock() = Some(handle);
        drop(stopped);
        true
    }
}
