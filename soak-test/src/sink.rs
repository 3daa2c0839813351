use relaymq::message::Record;
use relaymq::OffsetCommitter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;

/// Offset sink standing in for a real log client's mark-as-processed
/// primitive. Counts commits so the harness can wait for completion.
#[derive(Default)]
pub struct CountingSink {
    committed: AtomicU64,
}

impl CountingSink {
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    pub async fn wait_for(&self, target: u64) {
        while self.committed() < target {
            sleep(Duration::from_millis(10)).await;
        }
    }
}

impl OffsetCommitter for CountingSink {
    fn mark_processed(&self, _record: &Record) -> relaymq::Result<()> {
        self.committed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
