use std::fmt;

use serde::Serialize;

/// Stage of a migration, validation or cleanup run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Full read of the source collection.
    Scanning,
    /// Partitioning records by group key (migration only).
    Grouping,
    /// Staging and committing batches.
    Writing,
    /// Committing the last partial batch.
    Flushing,
    /// Re-reading migrated buckets.
    Validating,
    /// Re-reading the source collection after cleanup.
    Verifying,
    /// Assembling the final report.
    Reporting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Scanning => "scanning",
            Phase::Grouping => "grouping",
            Phase::Writing => "writing",
            Phase::Flushing => "flushing",
            Phase::Validating => "validating",
            Phase::Verifying => "verifying",
            Phase::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

/// Emitted after every successful batch commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitEvent {
    /// Bucket key or pass name the batch belongs to.
    pub scope: String,
    /// 1-based sequence number of the batch within the writer.
    pub batch_seq: u64,
    /// Operations in this batch.
    pub batch_ops: usize,
    /// Operations committed by the writer so far, including this batch.
    pub committed_ops: u64,
}

/// Receives progress notifications from a running pass.
pub trait ProgressObserver {
    /// A new phase started.
    fn on_phase(&self, _phase: Phase) {}

    /// A bucket of `records` records is about to be written.
    fn on_bucket(&self, _key: &str, _records: usize) {}

    /// A batch committed.
    fn on_commit(&self, _event: &CommitEvent) {}
}

/// Observer that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {}
