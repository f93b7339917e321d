use serde::Serialize;

/// Outcome of re-reading one migrated bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Validation {
    /// Group-key value.
    pub key: String,
    /// Destination collection that was re-read.
    pub target: String,
    /// Records in the source bucket.
    pub expected: usize,
    /// Records found at the destination, if the read succeeded.
    pub found: Option<usize>,
    /// Read failure, if any.
    pub error: Option<String>,
}

impl Validation {
    /// True when the read succeeded and the counts agree.
    pub fn matches(&self) -> bool {
        self.error.is_none() && self.found == Some(self.expected)
    }
}

/// Per-bucket section of a [`MigrationReport`].
#[derive(Clone, Debug, Serialize)]
pub struct BucketReport {
    /// Group-key value.
    pub key: String,
    /// Destination collection, when the key forms a valid path.
    pub target: Option<String>,
    /// Records in the bucket.
    pub expected: usize,
    /// Writes committed for the bucket.
    pub written: u64,
    /// Batches committed for the bucket.
    pub batches: u64,
    /// Batches the bucket needs at the configured batch size.
    pub planned_batches: u64,
    /// Failure that stopped the bucket, if any.
    pub error: Option<String>,
    /// Post-write validation, absent on dry runs and invalid targets.
    pub validation: Option<Validation>,
}

/// Result of a full migration run.
#[derive(Clone, Debug, Serialize)]
pub struct MigrationReport {
    /// Backend the run operated on.
    pub backend: String,
    /// Flat source collection.
    pub source: String,
    /// RFC 3339 start time.
    pub started_at: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Whether writes were skipped.
    pub dry_run: bool,
    /// Records found in the source collection.
    pub total_records: usize,
    /// Records without a usable group key.
    pub skipped_records: usize,
    /// Ids of the skipped records.
    pub skipped_ids: Vec<String>,
    /// One entry per bucket, in first-seen order.
    pub buckets: Vec<BucketReport>,
    /// Writes committed across all buckets.
    pub committed_ops: u64,
    /// Batches committed across all buckets.
    pub committed_batches: u64,
}

impl MigrationReport {
    /// Records routed into buckets.
    pub fn routed(&self) -> usize {
        self.buckets.iter().map(|b| b.expected).sum()
    }

    /// Buckets that recorded a write error.
    pub fn error_count(&self) -> usize {
        self.buckets.iter().filter(|b| b.error.is_some()).count()
    }

    /// Buckets whose validation disagreed with the source count.
    pub fn mismatch_count(&self) -> usize {
        self.buckets
            .iter()
            .filter_map(|b| b.validation.as_ref())
            .filter(|v| !v.matches())
            .count()
    }

    /// True when no bucket failed or mismatched.
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0 && self.mismatch_count() == 0
    }
}

/// Result of a read-only validation run.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyReport {
    /// Backend the run operated on.
    pub backend: String,
    /// Flat source collection.
    pub source: String,
    /// Whether every bucket validated.
    pub success: bool,
    /// Records found in the source collection.
    pub total_records: usize,
    /// Records without a usable group key.
    pub skipped_records: usize,
    /// One validation per bucket.
    pub validations: Vec<Validation>,
}

/// Result of a cleanup pass over the flat collection.
#[derive(Clone, Debug, Serialize)]
pub struct CleanupReport {
    /// Backend the run operated on.
    pub backend: String,
    /// Flat source collection.
    pub source: String,
    /// RFC 3339 start time.
    pub started_at: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: f64,
    /// Whether deletes were skipped.
    pub dry_run: bool,
    /// Source was empty at start; nothing was written.
    pub already_empty: bool,
    /// Records found at start.
    pub total_found: usize,
    /// Records the migration never copied (missing group key, or a key that
    /// is not a valid path segment); deleting them loses data.
    pub unmigrated_records: usize,
    /// Deletes committed.
    pub deleted: u64,
    /// Batches committed.
    pub batches: u64,
    /// Records left after the pass, if the verification read succeeded.
    pub remaining: Option<usize>,
    /// Whether the verification read found the collection empty.
    pub verified_empty: bool,
    /// Commit or verification failure, if any.
    pub error: Option<String>,
}
