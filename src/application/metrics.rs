//! Observability counters for the backoff guard.
//!
//! These never influence a guarded call's result; they exist for dashboards
//! and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters describing guard activity.
///
/// All counters use atomic operations. Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct GuardMetrics {
    inner: Arc<GuardMetricsInner>,
}

#[derive(Debug, Default)]
struct GuardMetricsInner {
    /// Calls let through to the store
    calls_admitted: AtomicU64,
    /// Calls rejected while the guard was open
    calls_rejected: AtomicU64,
    /// Outcomes that counted toward the threshold
    failures_counted: AtomicU64,
    /// Closed -> Open transitions
    times_opened: AtomicU64,
}

impl GuardMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_admitted(&self) {
        self.inner.calls_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.inner.calls_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.inner.failures_counted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_opened(&self) {
        self.inner.times_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Total calls let through to the store.
    pub fn calls_admitted(&self) -> u64 {
        self.inner.calls_admitted.load(Ordering::Relaxed)
    }

    /// Total calls rejected with the guard-open error.
    pub fn calls_rejected(&self) -> u64 {
        self.inner.calls_rejected.load(Ordering::Relaxed)
    }

    /// Total qualifying failures reported while closed.
    pub fn failures_counted(&self) -> u64 {
        self.inner.failures_counted.load(Ordering::Relaxed)
    }

    /// Number of times the guard opened.
    pub fn times_opened(&self) -> u64 {
        self.inner.times_opened.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> GuardMetricsSnapshot {
        GuardMetricsSnapshot {
            calls_admitted: self.calls_admitted(),
            calls_rejected: self.calls_rejected(),
            failures_counted: self.failures_counted(),
            times_opened: self.times_opened(),
        }
    }
}

/// A point-in-time copy of [`GuardMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardMetricsSnapshot {
    pub calls_admitted: u64,
    pub calls_rejected: u64,
    pub failures_counted: u64,
    pub times_opened: u64,
}

impl GuardMetricsSnapshot {
    /// Share of guarded calls that were rejected (0.0 to 1.0).
    ///
    /// Returns 0.0 if no calls were made.
    pub fn rejection_rate(&self) -> f64 {
        let total = self.total_calls();
        if total == 0 {
            0.0
        } else {
            self.calls_rejected as f64 / total as f64
        }
    }

    /// Admitted plus rejected calls.
    pub fn total_calls(&self) -> u64 {
        self.calls_admitted.saturating_add(self.calls_rejected)
    }
}
