//! Retry coordinator: the single decision point for commit vs re-dispatch.
//!
//! One dedicated task reads the ack queue. Success commits; a retryable
//! failure under the retry bound is re-dispatched after a delay; a failure
//! at the bound is committed anyway as a poison record, trading the
//! at-least-once guarantee for liveness of the partition.
//!
//! Delay timers run as independent spawned tasks so the coordinator's main
//! loop never sleeps, but their number is bounded by a semaphore sized to
//! the worker count. When the budget is exhausted during a failure storm
//! the coordinator blocks on a permit until a timer's delay elapses, which
//! backpressures the ack queue and, through it, the workers and the
//! claim-delivery path. A timer holds its permit only while sleeping,
//! never across the re-dispatch send.

use crate::broker::OffsetCommitter;
use crate::message::{Envelope, Outcome};
use crate::metrics::BrokerMetrics;
use crate::RelaymqError;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::sleep;
use tracing::{debug, error, warn};

pub(crate) struct RetryCoordinator {
    pub(crate) committer: Arc<dyn OffsetCommitter>,
    pub(crate) metrics: Arc<BrokerMetrics>,
    pub(crate) max_retry: u32,
    pub(crate) retry_delay: Duration,
    /// Bounds the number of in-flight delay timers.
    pub(crate) retry_budget: Arc<Semaphore>,
    /// Re-dispatch path back into the dispatch queue.
    pub(crate) dispatch_tx: mpsc::Sender<Envelope>,
    /// Timers subscribe here so an unfired delay is abandoned at shutdown.
    pub(crate) shutdown_tx: broadcast::Sender<()>,
    /// First fatal commit error of the session, surfaced from `stop`.
    pub(crate) fatal: Arc<Mutex<Option<RelaymqError>>>,
}

impl RetryCoordinator {
    pub(crate) async fn run(
        self,
        mut ack_rx: mpsc::Receiver<Envelope>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        debug!("retry coordinator started");
        let mut draining = false;

        loop {
            let envelope = if draining {
                // Keep resolving acks for in-flight work until every worker
                // has exited and dropped its sender.
                ack_rx.recv().await
            } else {
                tokio::select! {
                    envelope = ack_rx.recv() => envelope,
                    _ = shutdown_rx.recv() => {
                        draining = true;
                        continue;
                    }
                }
            };

            let Some(envelope) = envelope else { break };
            self.resolve(envelope, draining).await;
        }

        debug!("retry coordinator stopped");
    }

    async fn resolve(&self, mut envelope: Envelope, draining: bool) {
        match envelope.outcome {
            Outcome::Success => self.commit(&envelope),

            Outcome::RetryableFailure if envelope.attempt < self.max_retry => {
                if draining {
                    debug!(
                        id = %envelope.record.id,
                        attempt = envelope.attempt,
                        "session draining, abandoning retry"
                    );
                    self.metrics.retry_abandoned();
                    return;
                }
                self.schedule_redispatch(envelope).await;
            }

            Outcome::RetryableFailure => {
                envelope.outcome = Outcome::ExhaustedFailure;
                error!(
                    topic = %envelope.record.topic,
                    id = %envelope.record.id,
                    attempts = envelope.attempt + 1,
                    "retry budget exhausted, committing poison record"
                );
                self.metrics.record_exhausted();
                self.commit(&envelope);
            }

            Outcome::Unprocessed | Outcome::ExhaustedFailure => {
                // Workers only ever ack Success or RetryableFailure.
                warn!(
                    id = %envelope.record.id,
                    outcome = ?envelope.outcome,
                    "unexpected outcome on ack queue, dropping envelope"
                );
            }
        }
    }

    /// Spawn a delay timer that re-dispatches the envelope with its attempt
    /// counter advanced, unless shutdown fires first.
    async fn schedule_redispatch(&self, mut envelope: Envelope) {
        let permit = match self.retry_budget.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        envelope.prepare_redispatch();
        self.metrics.retry_scheduled();
        debug!(
            id = %envelope.record.id,
            attempt = envelope.attempt,
            delay_ms = self.retry_delay.as_millis() as u64,
            "scheduling re-dispatch"
        );

        let delay = self.retry_delay;
        let dispatch_tx = self.dispatch_tx.clone();
        let metrics = Arc::clone(&self.metrics);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown_rx.recv() => {
                    debug!("retry timer cancelled at shutdown");
                    metrics.retry_abandoned();
                    return;
                }
            }

            // The permit covers only the delay, never the re-dispatch
            // send: that send can block on a full dispatch queue, which
            // only drains once the coordinator gets a permit back.
            drop(permit);

            // A send into a sealed queue fails once the workers have
            // dropped the receive side; the envelope is abandoned.
            if dispatch_tx.send(envelope).await.is_err() {
                metrics.retry_abandoned();
            }
        });
    }

    fn commit(&self, envelope: &Envelope) {
        self.metrics.commit_requested();
        if let Err(e) = self.committer.mark_processed(&envelope.record) {
            error!(id = %envelope.record.id, error = %e, "offset commit failed");
            let mut fatal = self.fatal.lock();
            if fatal.is_none() {
                *fatal = Some(e);
            }
        }
    }
}
