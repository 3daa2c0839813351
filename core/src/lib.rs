//! # RelayMQ Core Library
//!
//! RelayMQ is a message processing broker: it consumes records from a
//! partitioned append log, fans them out to a bounded pool of concurrent
//! workers, dispatches each record to a topic-specific handler, and resolves
//! the outcome (commit or retry) while honoring the log's per-partition
//! offset-commit contract.
//!
//! ## Architecture Overview
//!
//! The broker is built from a small number of components connected by two
//! bounded queues:
//!
//! ```text
//! claim delivery ──▶ Dispatch Queue ──▶ Worker Pool ──▶ Topic Router ──▶ handler
//!        ▲                 ▲                                               │
//!        │                 │                                               ▼
//!   backpressure      re-dispatch ◀── Retry Coordinator ◀──────────── Ack Queue
//!                                          │
//!                                          └──▶ offset commit
//! ```
//!
//! - [`router::TopicRouter`] - Static topic-to-handler registration table
//! - [`broker::ProcessingBroker`] - Lifecycle, worker pool, retry coordination
//! - [`config::BrokerConfig`] - Worker count, retry bound, delays, queue sizing
//! - [`metrics::BrokerMetrics`] - Lock-free counters for observability
//!
//! ## Delivery Semantics
//!
//! RelayMQ provides at-least-once delivery with a bounded-retry, then-drop
//! policy for poison messages. A record whose handler keeps failing is
//! retried up to `max_retry` times and then committed anyway, at error log
//! severity, to preserve liveness of the partition. Handlers must therefore
//! be idempotent with respect to repeated delivery, and no per-key ordering
//! is guaranteed once a retry is involved.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relaymq::{BrokerConfig, HandlerError, ProcessingBroker, TopicRouter, OffsetCommitter};
//! use relaymq::message::Record;
//! use futures::FutureExt;
//! use std::sync::Arc;
//!
//! struct LogClient;
//! impl OffsetCommitter for LogClient {
//!     fn mark_processed(&self, _record: &Record) -> relaymq::Result<()> {
//!         // advance the committed offset past this record
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> relaymq::Result<()> {
//!     let router = TopicRouter::new().register("scraper.data", |record: &Record| {
//!         let payload = record.value.clone();
//!         async move {
//!             // tokenize-and-store, send-notification, ...
//!             let _ = payload;
//!             Ok::<(), HandlerError>(())
//!         }
//!         .boxed()
//!     });
//!
//!     let broker = ProcessingBroker::new(BrokerConfig::default(), router, Arc::new(LogClient))?;
//!     broker.start()?;
//!     // feed broker.on_claim_ready(..) from the log client's claim loop
//!     broker.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod config;
pub mod message;
pub mod metrics;
pub mod router;

pub use broker::{OffsetCommitter, ProcessingBroker};
pub use config::BrokerConfig;
pub use message::{Envelope, Outcome, Record, RecordId};
pub use metrics::{BrokerMetrics, MetricsSnapshot};
pub use router::{HandlerError, TopicHandler, TopicRouter};

use thiserror::Error;

/// RelayMQ error types
///
/// Handler failures are deliberately absent here: a failing handler is a
/// business-logic outcome resolved by the retry coordinator, never an error
/// surfaced to the broker's caller. What does surface is configuration
/// rejection, lifecycle misuse, and external log-broker failures (claim
/// delivery into a sealed queue, a failing commit primitive) - the classes
/// that are fatal to the current session.
#[derive(Debug, Error)]
pub enum RelaymqError {
    /// Configuration validation failures
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation invoked in a session state that does not permit it
    #[error("Lifecycle error: {0}")]
    Lifecycle(String),

    /// Claim delivered after the dispatch queue was sealed for draining
    #[error("Dispatch queue is sealed")]
    QueueSealed,

    /// The external log client rejected an offset commit
    #[error("Commit error: {0}")]
    Commit(String),
}

/// Result type alias used throughout RelayMQ
pub type Result<T> = std::result::Result<T, RelaymqError>;
