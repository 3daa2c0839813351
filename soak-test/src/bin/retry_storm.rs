use anyhow::Result;
use bytes::Bytes;
use futures::FutureExt;
use parking_lot::Mutex;
use relaymq::message::{Record, RecordId};
use relaymq::{HandlerError, ProcessingBroker, TopicRouter};
use soak_test::config::SoakConfig;
use soak_test::sink::CountingSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Every record fails its first N invocations, so the whole run funnels
/// through the retry path and exercises the delay-timer budget under load.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    info!("=== RelayMQ Retry Storm Soak ===");

    let target_records = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(1_000);
    let failures_per_record = std::env::var("SOAK_FAILURES_PER_RECORD")
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(2);

    let config = SoakConfig::from_env();
    info!(
        ?config,
        target_records, failures_per_record, "starting retry storm run"
    );

    let sink = Arc::new(CountingSink::default());
    let topic = config.topic.clone();

    let attempts: Arc<Mutex<HashMap<RecordId, u32>>> = Arc::new(Mutex::new(HashMap::new()));
    let attempts_for_handler = Arc::clone(&attempts);
    let router = TopicRouter::new().register(topic.clone(), move |record: &Record| {
        let seen = {
            let mut attempts = attempts_for_handler.lock();
            let seen = attempts.entry(record.id).or_insert(0);
            *seen += 1;
            *seen
        };
        async move {
            if seen <= failures_per_record {
                Err::<(), HandlerError>(format!("induced failure {seen}").into())
            } else {
                Ok(())
            }
        }
        .boxed()
    });

    let broker = ProcessingBroker::new(config.broker_config(), router, sink.clone())?;
    broker.start()?;

    let start = Instant::now();
    let mut batch = Vec::with_capacity(config.batch_size);
    for seq in 0..target_records {
        batch.push(Record::new(
            topic.clone(),
            None,
            Bytes::from(format!("storm-{seq}")),
            RecordId::new((seq % 4) as u32, seq),
        ));
        if batch.len() == config.batch_size {
            broker.on_claim_ready(std::mem::take(&mut batch)).await?;
        }
    }
    if !batch.is_empty() {
        broker.on_claim_ready(batch).await?;
    }
    info!("all {} records delivered, waiting for resolution", target_records);

    sink.wait_for(target_records).await;
    let elapsed = start.elapsed();
    broker.stop().await?;

    let snapshot = broker.metrics().snapshot();
    let expected_failures = target_records * u64::from(failures_per_record.min(config.max_retry + 1));
    info!(
        "done: {} records in {:.2}s, {} handler failures (expected {})",
        target_records, elapsed.as_secs_f64(), snapshot.handler_failures, expected_failures
    );
    info!(
        retries = snapshot.retries_scheduled,
        exhausted = snapshot.records_exhausted,
        abandoned = snapshot.retries_abandoned,
        commits = snapshot.commits_requested,
        "final metrics"
    );

    anyhow::ensure!(
        snapshot.commits_requested == target_records,
        "every record must resolve to exactly one commit"
    );
    Ok(())
}
