//! Worker pool: N concurrent tasks pulling envelopes from the dispatch
//! queue, invoking the routed handler, and emitting the classified outcome
//! onto the ack queue.
//!
//! Workers never commit offsets and never requeue - both decisions belong
//! exclusively to the retry coordinator. A worker that observes shutdown
//! exits its loop without draining; an in-flight handler invocation is
//! allowed to complete to avoid partial side effects.

use crate::message::{Envelope, Outcome};
use crate::metrics::BrokerMetrics;
use crate::router::TopicRouter;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, warn};

/// The dispatch queue's receive side, shared by all workers.
pub(crate) type SharedDispatchQueue = Arc<Mutex<mpsc::Receiver<Envelope>>>;

pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) dispatch: SharedDispatchQueue,
    pub(crate) ack_tx: mpsc::Sender<Envelope>,
    pub(crate) router: Arc<TopicRouter>,
    pub(crate) metrics: Arc<BrokerMetrics>,
}

impl Worker {
    pub(crate) async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        debug!(worker = self.id, "worker started");

        loop {
            let envelope = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                envelope = Self::next(&self.dispatch) => match envelope {
                    Some(envelope) => envelope,
                    // dispatch queue sealed and fully drained
                    None => break,
                },
            };

            let envelope = self.handle(envelope).await;

            // Blocking send applies backpressure to this worker if the
            // retry coordinator falls behind.
            if self.ack_tx.send(envelope).await.is_err() {
                break;
            }
        }

        debug!(worker = self.id, "worker stopped");
    }

    async fn next(queue: &SharedDispatchQueue) -> Option<Envelope> {
        queue.lock().await.recv().await
    }

    /// Route and invoke the handler, classifying the result into the
    /// envelope's outcome.
    async fn handle(&self, mut envelope: Envelope) -> Envelope {
        let record = &envelope.record;

        let Some(handler) = self.router.lookup(&record.topic) else {
            // Deliberate policy: commit rather than retry, so permanently
            // misrouted data cannot wedge the partition in a retry loop.
            warn!(
                topic = %record.topic,
                id = %record.id,
                "no handler registered for topic, committing without processing"
            );
            self.metrics.unknown_topic();
            envelope.outcome = Outcome::Success;
            return envelope;
        };

        debug!(
            worker = self.id,
            topic = %record.topic,
            id = %record.id,
            attempt = envelope.attempt,
            "processing record"
        );

        // A panicking handler must not take the worker down with it; it is
        // caught here and classified as a retryable failure.
        let invocation = AssertUnwindSafe(handler.process(record)).catch_unwind();

        envelope.outcome = match invocation.await {
            Ok(Ok(())) => {
                self.metrics.record_processed();
                Outcome::Success
            }
            Ok(Err(e)) => {
                warn!(
                    worker = self.id,
                    topic = %record.topic,
                    id = %record.id,
                    attempt = envelope.attempt,
                    error = %e,
                    "handler failed"
                );
                self.metrics.handler_failure();
                Outcome::RetryableFailure
            }
            Err(panic) => {
                let reason = panic_message(&panic);
                error!(
                    worker = self.id,
                    topic = %record.topic,
                    id = %record.id,
                    attempt = envelope.attempt,
                    reason,
                    "handler panicked"
                );
                self.metrics.handler_failure();
                Outcome::RetryableFailure
            }
        };

        envelope
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
