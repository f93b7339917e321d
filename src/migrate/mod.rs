#![forbid(unsafe_code)]

//! Repartitioning of a flat collection into per-key subcollections.
//!
//! A run scans the source collection, groups records by a key field, copies
//! each group under `{parent}/{key}/{subcollection}` in bounded atomic
//! batches, and re-reads every destination to validate counts. A separate,
//! destructive cleanup pass removes the flat collection afterwards.

mod batch;
mod cleanup;
mod driver;
mod error;
mod group;
mod options;
mod progress;
mod report;
mod util;
mod validate;

/// Capacity-bounded batching of writes.
///
/// Commits atomically whenever the batch is full and on explicit flush.
pub use batch::{planned_batches, BatchWriter};

/// Deletion of the flat source collection with post-delete verification.
pub use cleanup::{cleanup, count_unmigrated};

/// The migration driver.
pub use driver::migrate;

/// Error types for migration runs.
pub use error::{MigrateError, Result};

/// Partitioning of records by group key.
pub use group::{group_documents, group_key_of, Bucket, Grouping};

/// Collections and limits of a run.
pub use options::{MigrationOptions, DEFAULT_BATCH_SIZE};

/// Progress notifications emitted while a run is in flight.
pub use progress::{CommitEvent, NoProgress, Phase, ProgressObserver};

/// Reports returned by each pass.
pub use report::{BucketReport, CleanupReport, MigrationReport, Validation, VerifyReport};

/// Opening the on-disk database.
pub use util::open_store;

/// Read-only validation of migrated buckets.
pub use validate::{validate_bucket, verify_migration};
