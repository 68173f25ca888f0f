//! Liveness derived from the last successful collection cycle

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Last successful poll, shared by the collector (writer) and the health
/// endpoint (reader)
#[derive(Debug)]
pub struct HealthState {
    /// Unix seconds
    last_success: AtomicI64,
    poll_interval: Duration,
}

impl HealthState {
    /// Start out fresh so the first cycles have a full grace period
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            last_success: AtomicI64::new(chrono::Utc::now().timestamp()),
            poll_interval,
        }
    }

    pub fn mark_success(&self) {
        self.mark_success_at(chrono::Utc::now().timestamp());
    }

    pub fn mark_success_at(&self, unix_secs: i64) {
        self.last_success.store(unix_secs, Ordering::SeqCst);
    }

    pub fn last_success(&self) -> i64 {
        self.last_success.load(Ordering::SeqCst)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn report(&self) -> HealthReport {
        self.report_at(chrono::Utc::now().timestamp())
    }

    /// Unhealthy once more than three poll intervals pass without success
    pub fn report_at(&self, now_unix_secs: i64) -> HealthReport {
        let seconds_since_poll = now_unix_secs - self.last_success();
        let max_gap = 3 * self.poll_interval.as_secs() as i64;

        HealthReport {
            healthy: seconds_since_poll <= max_gap,
            seconds_since_poll,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub healthy: bool,
    pub seconds_since_poll: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_is_healthy() {
        let state = HealthState::new(Duration::from_secs(20));
        let report = state.report();
        assert!(report.healthy);
        assert!(report.seconds_since_poll <= 1);
    }

    #[test]
    fn test_stale_boundary() {
        let state = HealthState::new(Duration::from_secs(20));
        state.mark_success_at(1_000);

        assert!(state.report_at(1_060).healthy);
        let report = state.report_at(1_061);
        assert!(!report.healthy);
        assert_eq!(report.seconds_since_poll, 61);
    }
}
