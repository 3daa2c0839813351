use anyhow::Result;
use bytes::Bytes;
use futures::FutureExt;
use relaymq::message::{Record, RecordId};
use relaymq::{HandlerError, ProcessingBroker, TopicRouter};
use soak_test::config::SoakConfig;
use soak_test::sink::CountingSink;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    info!("=== RelayMQ Steady Load Soak ===");

    let target_records = std::env::args()
        .nth(1)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10_000);

    let config = SoakConfig::from_env();
    info!(?config, target_records, "starting steady load run");

    let sink = Arc::new(CountingSink::default());
    let topic = config.topic.clone();

    // Handler does a token of real work: parse the json payload and count
    // whitespace-separated words, the way the downstream indexer would.
    let router = TopicRouter::new().register(topic.clone(), |record: &Record| {
        let payload = record.value.clone();
        async move {
            let value: serde_json::Value = serde_json::from_slice(&payload)?;
            let body = value["body"].as_str().unwrap_or_default();
            let _tokens = body.split_whitespace().count();
            Ok::<(), HandlerError>(())
        }
        .boxed()
    });

    let broker = ProcessingBroker::new(config.broker_config(), router, sink.clone())?;
    broker.start()?;

    let start = Instant::now();
    let mut batch = Vec::with_capacity(config.batch_size);
    for seq in 0..target_records {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64;
        let payload = serde_json::json!({
            "seq": seq,
            "timestamp": timestamp,
            "body": "the quick brown fox jumps over the lazy dog",
        });
        batch.push(Record::new(
            topic.clone(),
            None,
            Bytes::from(serde_json::to_vec(&payload)?),
            RecordId::new((seq % 4) as u32, seq),
        ));

        if batch.len() == config.batch_size {
            broker.on_claim_ready(std::mem::take(&mut batch)).await?;
        }
        if seq > 0 && seq % 1000 == 0 {
            let rate = seq as f64 / start.elapsed().as_secs_f64();
            info!("delivered {} records ({:.2} rec/sec)", seq, rate);
        }
    }
    if !batch.is_empty() {
        broker.on_claim_ready(batch).await?;
    }

    sink.wait_for(target_records).await;
    let elapsed = start.elapsed();
    broker.stop().await?;

    let snapshot = broker.metrics().snapshot();
    info!(
        "done: {} records in {:.2}s ({:.2} rec/sec)",
        target_records,
        elapsed.as_secs_f64(),
        target_records as f64 / elapsed.as_secs_f64()
    );
    info!(
        processed = snapshot.records_processed,
        commits = snapshot.commits_requested,
        retries = snapshot.retries_scheduled,
        failures = snapshot.handler_failures,
        "final metrics"
    );

    Ok(())
}
