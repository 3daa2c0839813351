//! Partition session lifecycle.
//!
//! The broker binds its worker pool and retry coordinator to the external
//! log client's consumer-group session. The state machine is
//! Idle -> Running -> Draining -> Stopped; a stopped broker is reusable for
//! a fresh session and carries nothing across sessions beyond
//! configuration.

use crate::broker::retry::RetryCoordinator;
use crate::broker::worker::Worker;
use crate::broker::OffsetCommitter;
use crate::config::BrokerConfig;
use crate::message::Envelope;
use crate::metrics::BrokerMetrics;
use crate::router::TopicRouter;
use crate::{RelaymqError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Session lifecycle states.
pub(crate) enum SessionState {
    Idle,
    Running(ActiveSession),
    Draining,
    Stopped,
}

impl SessionState {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running(_) => "running",
            SessionState::Draining => "draining",
            SessionState::Stopped => "stopped",
        }
    }
}

/// Everything owned by a live session: the claim-side dispatch sender, the
/// session-scoped shutdown signal, and the task handles to join at drain.
pub(crate) struct ActiveSession {
    dispatch_tx: mpsc::Sender<Envelope>,
    shutdown_tx: broadcast::Sender<()>,
    worker_handles: Vec<JoinHandle<()>>,
    coordinator_handle: JoinHandle<()>,
    fatal: Arc<Mutex<Option<RelaymqError>>>,
}

impl ActiveSession {
    /// Spawn the worker pool and retry coordinator for a fresh session.
    pub(crate) fn spawn(
        config: &BrokerConfig,
        router: Arc<TopicRouter>,
        committer: Arc<dyn OffsetCommitter>,
        metrics: Arc<BrokerMetrics>,
    ) -> Self {
        let capacity = config.effective_queue_capacity();
        let (dispatch_tx, dispatch_rx) = mpsc::channel::<Envelope>(capacity);
        let (ack_tx, ack_rx) = mpsc::channel::<Envelope>(capacity);
        let (shutdown_tx, _) = broadcast::channel(16);

        // All workers pull from the one dispatch receiver.
        let dispatch_queue = Arc::new(tokio::sync::Mutex::new(dispatch_rx));

        let mut worker_handles = Vec::with_capacity(config.worker_count);
        for id in 0..config.worker_count {
            let worker = Worker {
                id,
                dispatch: Arc::clone(&dispatch_queue),
                ack_tx: ack_tx.clone(),
                router: Arc::clone(&router),
                metrics: Arc::clone(&metrics),
            };
            worker_handles.push(tokio::spawn(worker.run(shutdown_tx.subscribe())));
        }
        // Workers hold the only ack senders now; the ack queue closes when
        // the last worker exits.
        drop(ack_tx);

        let fatal = Arc::new(Mutex::new(None));
        let coordinator = RetryCoordinator {
            committer,
            metrics,
            max_retry: config.max_retry,
            retry_delay: config.retry_delay(),
            retry_budget: Arc::new(Semaphore::new(config.worker_count)),
            dispatch_tx: dispatch_tx.clone(),
            shutdown_tx: shutdown_tx.clone(),
            fatal: Arc::clone(&fatal),
        };
        let coordinator_handle = tokio::spawn(coordinator.run(ack_rx, shutdown_tx.subscribe()));

        info!(
            workers = config.worker_count,
            max_retry = config.max_retry,
            retry_delay_ms = config.retry_delay_ms,
            queue_capacity = capacity,
            "session started"
        );

        Self {
            dispatch_tx,
            shutdown_tx,
            worker_handles,
            coordinator_handle,
            fatal,
        }
    }

    /// Claim-side sender for the dispatch queue.
    pub(crate) fn dispatch_tx(&self) -> mpsc::Sender<Envelope> {
        self.dispatch_tx.clone()
    }

    /// Seal the queues, cancel the session and join every task. Records in
    /// flight resolve; scheduled retries that have not fired yet are
    /// abandoned without a commit.
    pub(crate) async fn drain(self) -> Result<()> {
        // Sealing: the claim path loses its sender, so no new envelopes
        // enter; workers see the cancellation and stop dequeuing.
        drop(self.dispatch_tx);
        let _ = self.shutdown_tx.send(());

        for handle in self.worker_handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task join failed");
            }
        }
        if let Err(e) = self.coordinator_handle.await {
            warn!(error = %e, "retry coordinator join failed");
        }

        info!("session drained");

        match self.fatal.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
