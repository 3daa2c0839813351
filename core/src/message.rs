//! Record and envelope types flowing through the broker's queues.
//!
//! A [`Record`] is one unit of data delivered by the external partitioned
//! log; it is immutable once delivered. An [`Envelope`] wraps a record with
//! the broker's own processing state: the retry attempt counter and the
//! processing outcome. The envelope is the unit of ownership - exactly one
//! component (queue, worker, or retry coordinator) holds it at any time, and
//! ownership only transfers through queue hand-off.

use bytes::Bytes;
use std::fmt;

/// Topic name type
pub type TopicName = String;

/// Partition identifier type
pub type PartitionId = u32;

/// Log offset type
pub type Offset = u64;

/// Externally assigned identity of a record: its position in the log.
///
/// This is the coordinate handed back to the log client when the broker
/// requests a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub partition: PartitionId,
    pub offset: Offset,
}

impl RecordId {
    pub fn new(partition: PartitionId, offset: Offset) -> Self {
        Self { partition, offset }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.partition, self.offset)
    }
}

/// One unit of data delivered from the external partitioned log.
#[derive(Debug, Clone)]
pub struct Record {
    /// Source topic the record was consumed from
    pub topic: TopicName,
    /// Optional partitioning key
    pub key: Option<Bytes>,
    /// Opaque payload
    pub value: Bytes,
    /// Partition + offset identity used for commit
    pub id: RecordId,
}

impl Record {
    pub fn new(
        topic: impl Into<TopicName>,
        key: Option<Bytes>,
        value: impl Into<Bytes>,
        id: RecordId,
    ) -> Self {
        Self {
            topic: topic.into(),
            key,
            value: value.into(),
            id,
        }
    }
}

/// Processing outcome of an envelope, set by the worker that ran the
/// handler and consumed by the retry coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not yet handed to a worker (initial state, and the reset state on
    /// re-dispatch)
    Unprocessed,
    /// Handler completed without error; eligible for commit
    Success,
    /// Handler returned an error or panicked; eligible for retry
    RetryableFailure,
    /// Retry bound reached; committed anyway and never re-dispatched
    ExhaustedFailure,
}

/// A record plus the broker's processing state for it.
///
/// `attempt` starts at 0 and is incremented only by the retry coordinator
/// on re-dispatch; it never exceeds the configured retry bound. The field
/// is written while the envelope is exclusively held, so no synchronization
/// is needed beyond the queue hand-off itself.
#[derive(Debug)]
pub struct Envelope {
    pub record: Record,
    pub attempt: u32,
    pub outcome: Outcome,
}

impl Envelope {
    /// Wrap a freshly claimed record: attempt 0, unprocessed.
    pub fn new(record: Record) -> Self {
        Self {
            record,
            attempt: 0,
            outcome: Outcome::Unprocessed,
        }
    }

    /// Reset for re-dispatch with the attempt counter advanced. Retry
    /// coordinator only.
    pub fn prepare_redispatch(&mut self) {
        self.attempt += 1;
        self.outcome = Outcome::Unprocessed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_envelope_is_unprocessed_first_attempt() {
        let record = Record::new("topic-a", None, "payload", RecordId::new(2, 41));
        let envelope = Envelope::new(record);

        assert_eq!(envelope.attempt, 0);
        assert_eq!(envelope.outcome, Outcome::Unprocessed);
        assert_eq!(envelope.record.id, RecordId::new(2, 41));
    }

    #[test]
    fn test_prepare_redispatch_advances_attempt_and_resets_outcome() {
        let record = Record::new("topic-a", None, "payload", RecordId::new(0, 7));
        let mut envelope = Envelope::new(record);
        envelope.outcome = Outcome::RetryableFailure;

        envelope.prepare_redispatch();

        assert_eq!(envelope.attempt, 1);
        assert_eq!(envelope.outcome, Outcome::Unprocessed);
    }

    #[test]
    fn test_record_id_display() {
        assert_eq!(RecordId::new(3, 1200).to_string(), "3@1200");
    }
}
