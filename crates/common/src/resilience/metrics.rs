//! Counters for one resilient caller.
//!
//! Guarded by their own mutex, separate from the breaker's, so a snapshot is
//! always internally consistent.

use parking_lot::Mutex;
use serde::Serialize;

/// Point-in-time copy of the call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallMetricsSnapshot {
    /// External invocations, including rejected ones
    pub calls: u64,
    /// Invocations that returned a value
    pub successes: u64,
    /// Invocations the breaker counted as failures
    pub failures: u64,
    /// Invocations rejected by an open breaker
    pub rejected: u64,
    /// Breaker state transitions observed
    pub state_changes: u64,
    /// Attempts beyond the first, summed over all invocations
    pub retry_attempts_total: u64,
}

/// Thread-safe counters, monotonically increasing until [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct CallMetrics {
    counters: Mutex<CallMetricsSnapshot>,
}

impl CallMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self) {
        self.counters.lock().calls += 1;
    }

    pub fn record_rejected(&self) {
        self.counters.lock().rejected += 1;
    }

    pub fn record_state_change(&self) {
        self.counters.lock().state_changes += 1;
    }

    /// Record a successful invocation that used `attempts` attempts.
    pub fn record_success(&self, attempts: u32) {
        let mut counters = self.counters.lock();
        counters.successes += 1;
        counters.retry_attempts_total += u64::from(attempts.saturating_sub(1));
    }

    /// Record a failed invocation that used `attempts` attempts.
    pub fn record_failure(&self, attempts: u32) {
        let mut counters = self.counters.lock();
        counters.failures += 1;
        counters.retry_attempts_total += u64::from(attempts.saturating_sub(1));
    }

    /// Record an invocation that ended in an excluded error.
    pub fn record_excluded(&self, attempts: u32) {
        self.counters.lock().retry_attempts_total += u64::from(attempts.saturating_sub(1));
    }

    pub fn snapshot(&self) -> CallMetricsSnapshot {
        *self.counters.lock()
    }

    /// Zero every counter (admin/test action).
    pub fn reset(&self) {
        *self.counters.lock() = CallMetricsSnapshot::default();
    }
}
