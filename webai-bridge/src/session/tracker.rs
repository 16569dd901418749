//! Consecutive refresh failure tracking.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Tracks consecutive refresh failures for the active session.
///
/// Cleared by the first successful refresh.
#[derive(Debug, Default)]
pub struct RefreshFailureTracker {
    record: Mutex<Option<FailureInfo>>,
}

/// Failure streak details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureInfo {
    /// Number of consecutive failures.
    pub count: u32,
    /// Time of first failure in this streak.
    pub first_failure: DateTime<Utc>,
    /// Time of most recent failure.
    pub last_failure: DateTime<Utc>,
    /// Error message from last failure.
    pub last_error: String,
}

impl RefreshFailureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and return the updated count.
    pub fn record_failure(&self, error: &str) -> u32 {
        let now = Utc::now();
        let mut record = self.record.lock();
        let info = record.get_or_insert_with(|| FailureInfo {
            count: 0,
            first_failure: now,
            last_failure: now,
            last_error: String::new(),
        });

        info.count += 1;
        info.last_failure = now;
        info.last_error = error.to_string();
        info.count
    }

    pub fn clear(&self) {
        self.record.lock().take();
    }

    pub fn failure_count(&self) -> u32 {
        self.record.lock().as_ref().map(|r| r.count).unwrap_or(0)
    }

    pub fn failure_info(&self) -> Option<FailureInfo> {
        self.record.lock().clone()
    }

    /// Escalate on the first failure and every third one after that.
    pub fn should_escalate(count: u32) -> bool {
        count == 1 || count % 3 == 0
    }
}
