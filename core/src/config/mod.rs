pub mod settings;

use crate::{RelaymqError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`ProcessingBroker`](crate::ProcessingBroker).
///
/// The queue capacity defaults to `2 x worker_count`: small enough that a
/// full dispatch queue pushes back on the claim-delivery path, large enough
/// that workers rarely starve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Number of concurrent workers pulling from the dispatch queue
    pub worker_count: usize,
    /// Maximum re-dispatches per record before it is committed as poison
    pub max_retry: u32,
    /// Delay before a failed record is re-dispatched, in milliseconds
    pub retry_delay_ms: u64,
    /// Capacity of the dispatch and ack queues; `None` derives
    /// `2 x worker_count`
    pub queue_capacity: Option<usize>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            worker_count: 5,
            max_retry: 3,
            retry_delay_ms: 5_000,
            queue_capacity: None,
        }
    }
}

impl BrokerConfig {
    /// Delay between a retryable failure and its re-dispatch.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Effective capacity of each of the two queues.
    pub fn effective_queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.worker_count * 2)
    }

    /// Reject configurations the broker cannot run with. A zero retry
    /// budget is valid (fail once, commit as poison); zero workers or a
    /// zero-capacity queue is not.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(RelaymqError::Config(
                "worker_count must be at least 1".to_string(),
            ));
        }
        if self.effective_queue_capacity() == 0 {
            return Err(RelaymqError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.worker_count, 5);
        assert_eq!(config.max_retry, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.effective_queue_capacity(), 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_queue_capacity_overrides_derivation() {
        let config = BrokerConfig {
            worker_count: 4,
            queue_capacity: Some(32),
            ..Default::default()
        };
        assert_eq!(config.effective_queue_capacity(), 32);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = BrokerConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RelaymqError::Config(_))
        ));
    }

    #[test]
    fn test_zero_queue_capacity_rejected() {
        let config = BrokerConfig {
            queue_capacity: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_retry_is_valid() {
        let config = BrokerConfig {
            max_retry: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
