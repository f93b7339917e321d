#![forbid(unsafe_code)]

//! Document database backends.
//!
//! The migration passes only need three things from a backend: list the
//! documents of a collection, commit a bounded batch of writes atomically, and
//! name itself for logs. [`DocumentStore`] captures exactly that so the passes
//! can run against the in-process [`MemoryStore`] or the on-disk [`FileStore`].

mod file;
mod memory;
mod snapshot;

use crate::types::{CollectionPath, Document, Result, WriteOp};

pub use file::{FileStore, StoreOpenOptions};
pub use memory::{FaultPlan, MemoryStore};
pub use snapshot::Snapshot;

/// Hard ceiling on operations per committed batch.
pub const MAX_BATCH_OPS: usize = 500;

/// Minimal document database surface used by the migration passes.
pub trait DocumentStore: Send + Sync {
    /// Every document directly inside `collection`, ordered by id.
    ///
    /// Documents living in nested subcollections are not included.
    fn list_documents(&self, collection: &CollectionPath) -> Result<Vec<Document>>;

    /// Applies `ops` atomically: either every write lands or none does.
    fn commit(&self, ops: &[WriteOp]) -> Result<()>;

    /// Short label used in logs and reports.
    fn describe(&self) -> String;
}
