//! # Message Processing Broker
//!
//! [`ProcessingBroker`] consumes records claimed from a partitioned log,
//! fans them out to a bounded worker pool, and resolves each outcome
//! through a single retry coordinator that either commits the record's
//! offset or schedules a delayed re-dispatch.
//!
//! ## Lifecycle
//!
//! The broker binds to the external log client's consumer-group session
//! through three callbacks:
//!
//! - [`ProcessingBroker::on_session_granted`] - partition assignment
//!   arrived; spawn the worker pool and retry coordinator
//! - [`ProcessingBroker::on_claim_ready`] - claimed records delivered;
//!   enqueue them (blocking when the dispatch queue is full, which is the
//!   system's backpressure control)
//! - [`ProcessingBroker::on_session_revoked`] - rebalance or shutdown;
//!   seal the queues, cancel, and join every task
//!
//! [`ProcessingBroker::start`] and [`ProcessingBroker::stop`] expose the
//! same transitions to the owning process directly.
//!
//! ## Ownership discipline
//!
//! The two bounded queues are the only shared structures. An envelope is
//! exclusively owned by whichever component currently holds it, and
//! ownership transfers only through queue hand-off - workers never commit
//! and never requeue, and only the retry coordinator touches the attempt
//! counter.

pub(crate) mod retry;
pub(crate) mod session;
pub(crate) mod worker;


use crate::config::BrokerConfig;
use crate::message::{Envelope, Record};
use crate::metrics::BrokerMetrics;
use crate::router::TopicRouter;
use crate::{RelaymqError, Result};
use parking_lot::Mutex;
use session::{ActiveSession, SessionState};
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tracing::info;

/// Consumed interface to the external log client: advancing the committed
/// offset for a record's partition past that record.
///
/// This is the only channel by which a partition's committed offset moves,
/// mirroring the consumer-group session's mark-as-processed primitive. The
/// mark itself is an in-memory operation on the client side, hence the
/// synchronous signature; a failing implementation is treated as fatal to
/// the session and surfaced from [`ProcessingBroker::stop`].
pub trait OffsetCommitter: Send + Sync {
    fn mark_processed(&self, record: &Record) -> Result<()>;
}

/// The message processing broker.
///
/// Construction fixes the topic registration table, the commit channel and
/// the configuration for the broker's lifetime. One broker value serves
/// one session at a time but is reusable across sessions.
pub struct ProcessingBroker {
    config: BrokerConfig,
    router: Arc<TopicRouter>,
    committer: Arc<dyn OffsetCommitter>,
    metrics: Arc<BrokerMetrics>,
    session: Mutex<SessionState>,
    /// Signaled each time an in-progress drain reaches `Stopped`.
    drained: Notify,
}

impl ProcessingBroker {
    /// Create a broker from validated configuration, a handler table and
    /// the external commit channel.
    pub fn new(
        config: BrokerConfig,
        router: TopicRouter,
        committer: Arc<dyn OffsetCommitter>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            router: Arc::new(router),
            committer,
            metrics: Arc::new(BrokerMetrics::new()),
            session: Mutex::new(SessionState::Idle),
            drained: Notify::new(),
        })
    }

    /// Use an externally owned metrics aggregator instead of a private one.
    pub fn with_metrics(mut self, metrics: Arc<BrokerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// The broker's metrics aggregator.
    pub fn metrics(&self) -> &Arc<BrokerMetrics> {
        &self.metrics
    }

    /// Spawn the worker pool and retry coordinator for a new session.
    ///
    /// Valid from `Idle` (fresh broker) or `Stopped` (previous session
    /// fully drained); starting a running or draining broker is a
    /// lifecycle error.
    pub fn start(&self) -> Result<()> {
        let mut session = self.session.lock();
        match &*session {
            SessionState::Idle | SessionState::Stopped => {
                let topics: Vec<&str> = self.router.topics().collect();
                info!(?topics, "starting processing broker");
                *session = SessionState::Running(ActiveSession::spawn(
                    &self.config,
                    Arc::clone(&self.router),
                    Arc::clone(&self.committer),
                    Arc::clone(&self.metrics),
                ));
                Ok(())
            }
            state => Err(RelaymqError::Lifecycle(format!(
                "cannot start broker in {} state",
                state.name()
            ))),
        }
    }

    /// Drain and stop the current session, blocking until every worker and
    /// the retry coordinator have exited.
    ///
    /// Scheduled retries that have not fired yet are abandoned without a
    /// commit; those records will be redelivered by the log on the next
    /// session. Stopping an idle or already stopped broker is a no-op, and
    /// a `stop` that arrives while another caller is draining waits for
    /// that drain to finish. A fatal commit error recorded during the
    /// session is returned to the caller that performed the drain.
    pub async fn stop(&self) -> Result<()> {
        let active = loop {
            let mut waiter = pin!(self.drained.notified());
            waiter.as_mut().enable();
            {
                let mut session = self.session.lock();
                match std::mem::replace(&mut *session, SessionState::Draining) {
                    SessionState::Running(active) => break active,
                    SessionState::Idle => {
                        *session = SessionState::Idle;
                        return Ok(());
                    }
                    SessionState::Stopped => {
                        *session = SessionState::Stopped;
                        return Ok(());
                    }
                    // Another caller owns the drain; wait and re-check.
                    SessionState::Draining => {}
                }
            }
            waiter.await;
        };

        let result = active.drain().await;
        *self.session.lock() = SessionState::Stopped;
        self.drained.notify_waiters();
        result
    }

    /// Lifecycle callback: the consumer-group session granted this broker
    /// a partition assignment.
    pub fn on_session_granted(&self) -> Result<()> {
        self.start()
    }

    /// Lifecycle callback: claimed records arrived from the log.
    ///
    /// Each record is wrapped in a fresh envelope and enqueued onto the
    /// dispatch queue. A full queue blocks this call - deliberately: that
    /// blocking throttles the external claim-delivery loop when downstream
    /// handlers are slow.
    pub async fn on_claim_ready(&self, records: Vec<Record>) -> Result<()> {
        let dispatch_tx = self.claim_sender()?;
        for record in records {
            self.metrics.record_received();
            dispatch_tx
                .send(Envelope::new(record))
                .await
                .map_err(|_| RelaymqError::QueueSealed)?;
        }
        Ok(())
    }

    /// Lifecycle callback: the session was revoked (rebalance/shutdown).
    pub async fn on_session_revoked(&self) -> Result<()> {
        self.stop().await
    }

    fn claim_sender(&self) -> Result<mpsc::Sender<Envelope>> {
        let session = self.session.lock();
        match &*session {
            SessionState::Running(active) => Ok(active.dispatch_tx()),
            state => Err(RelaymqError::Lifecycle(format!(
                "claims delivered while broker is {}",
                state.name()
            ))),
        }
    }
}
