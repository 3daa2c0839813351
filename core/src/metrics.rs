//! Broker metrics collection.
//!
//! Lock-free atomic counters updated from the hot paths with relaxed
//! ordering, snapshotted on demand. The aggregator is an explicitly owned
//! instance handed to the broker at construction, never a process-wide
//! registry, so the broker's concurrency reasoning stays self-contained.
//!
//! The `records_exhausted` counter is the observable trace of the
//! silent-data-loss edge case: a poison record that was committed after its
//! retry budget ran out. Alerting belongs on that counter and the matching
//! error log line.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters for a processing broker instance.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    /// Records accepted from claim delivery
    records_received: AtomicU64,
    /// Handler invocations that completed without error
    records_processed: AtomicU64,
    /// Handler invocations that returned an error or panicked
    handler_failures: AtomicU64,
    /// Delayed re-dispatches scheduled by the retry coordinator
    retries_scheduled: AtomicU64,
    /// Scheduled retries abandoned because the session drained first
    retries_abandoned: AtomicU64,
    /// Poison records committed after exhausting the retry budget
    records_exhausted: AtomicU64,
    /// Offset commits requested from the external log client
    commits_requested: AtomicU64,
    /// Records arriving on a topic with no registered handler
    unknown_topic: AtomicU64,
}

impl BrokerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.records_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.records_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry_scheduled(&self) {
        self.retries_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry_abandoned(&self) {
        self.retries_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.records_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn commit_requested(&self) {
        self.commits_requested.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_topic(&self) {
        self.unknown_topic.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_received(&self) -> u64 {
        self.records_received.load(Ordering::Relaxed)
    }

    pub fn records_processed(&self) -> u64 {
        self.records_processed.load(Ordering::Relaxed)
    }

    pub fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }

    pub fn retries_scheduled(&self) -> u64 {
        self.retries_scheduled.load(Ordering::Relaxed)
    }

    pub fn retries_abandoned(&self) -> u64 {
        self.retries_abandoned.load(Ordering::Relaxed)
    }

    pub fn records_exhausted(&self) -> u64 {
        self.records_exhausted.load(Ordering::Relaxed)
    }

    pub fn commits_requested(&self) -> u64 {
        self.commits_requested.load(Ordering::Relaxed)
    }

    pub fn unknown_topics(&self) -> u64 {
        self.unknown_topic.load(Ordering::Relaxed)
    }

    /// Consistent-enough point-in-time view for reporting. Individual loads
    /// are relaxed; counters may be mid-update relative to each other.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_received: self.records_received(),
            records_processed: self.records_processed(),
            handler_failures: self.handler_failures(),
            retries_scheduled: self.retries_scheduled(),
            retries_abandoned: self.retries_abandoned(),
            records_exhausted: self.records_exhausted(),
            commits_requested: self.commits_requested(),
            unknown_topic: self.unknown_topics(),
        }
    }
}

/// Point-in-time view of [`BrokerMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_received: u64,
    pub records_processed: u64,
    pub handler_failures: u64,
    pub retries_scheduled: u64,
    pub retries_abandoned: u64,
    pub records_exhausted: u64,
    pub commits_requested: u64,
    pub unknown_topic: u64,
}

impl MetricsSnapshot {
    /// Records currently somewhere between claim delivery and resolution.
    pub fn in_flight(&self) -> u64 {
        self.records_received
            .saturating_sub(self.commits_requested + self.retries_abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_roll_up_into_snapshot() {
        let metrics = BrokerMetrics::new();
        metrics.record_received();
        metrics.record_received();
        metrics.handler_failure();
        metrics.retry_scheduled();
        metrics.record_processed();
        metrics.commit_requested();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_received, 2);
        assert_eq!(snapshot.handler_failures, 1);
        assert_eq!(snapshot.retries_scheduled, 1);
        assert_eq!(snapshot.records_processed, 1);
        assert_eq!(snapshot.commits_requested, 1);
        assert_eq!(snapshot.in_flight(), 1);
    }

    #[test]
    fn test_in_flight_never_underflows() {
        let metrics = BrokerMetrics::new();
        metrics.commit_requested();
        assert_eq!(metrics.snapshot().in_flight(), 0);
    }
}
