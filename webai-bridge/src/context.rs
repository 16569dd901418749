//! Per-operation deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The operation was cancelled by its caller or ran past its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Cancellation signal plus optional deadline, handed to every session
/// operation.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    /// A context that never expires unless its token is cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Tie this context to an externally owned token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once cancelled or past the deadline.
    pub fn is_done(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Drive `fut` until it completes, the token fires, or the deadline passes.
    ///
    /// Returns [`Cancelled`] without polling `fut` when the context is already
    /// done, so an expired context never starts I/O.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Cancelled> {
        if self.is_done() {
            return Err(Cancelled);
        }

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cancelled),
            _ = deadline => Err(Cancelled),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = OpContext::new();
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_never_polls() {
        let ctx = OpContext::with_timeout(Duration::from_millis(10));
        tokio::time::advance(Duration::from_millis(20)).await;
        assert!(ctx.is_done());

        let polled = Arc::new(AtomicBool::new(false));
        let flag = polled.clone();
        let result = ctx
            .run(async move {
                flag.store(true, Ordering::SeqCst);
            })
            .await;

        assert_eq!(result, Err(Cancelled));
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_interrupts_slow_future() {
        let ctx = OpContext::with_timeout(Duration::from_secs(1));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert_eq!(result, Err(Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_token() {
        let token = CancellationToken::new();
        let ctx = OpContext::new().with_cancel_token(token.clone());
        token.cancel();
        assert!(ctx.is_done());
        assert_eq!(ctx.run(async { 1 }).await, Err(Cancelled));
    }
}
