use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Time source for the refresh cadence.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
