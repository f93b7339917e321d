//! Capacity-bounded batching of writes.

use tracing::debug;

use crate::migrate::progress::{CommitEvent, NoProgress, ProgressObserver};
use crate::migrate::{MigrateError, Result};
use crate::store::{DocumentStore, MAX_BATCH_OPS};
use crate::types::{self, WriteOp};

/// Accumulates writes and commits them in atomic groups of at most
/// `capacity` operations.
///
/// Callers must [`flush`](Self::flush) after their last staged write; a
/// partially filled batch is never committed implicitly.
pub struct BatchWriter<'a> {
    store: &'a dyn DocumentStore,
    observer: &'a dyn ProgressObserver,
    capacity: usize,
    scope: String,
    pending: Vec<WriteOp>,
    committed_ops: u64,
    committed_batches: u64,
}

impl<'a> BatchWriter<'a> {
    /// Creates a writer committing into `store`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidOptions`] if `capacity` is zero or above
    /// [`MAX_BATCH_OPS`].
    pub fn new(store: &'a dyn DocumentStore, capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_BATCH_OPS {
            return Err(MigrateError::InvalidOptions(format!(
                "batch capacity {capacity} must be between 1 and {MAX_BATCH_OPS}"
            )));
        }
        Ok(Self {
            store,
            observer: &NoProgress,
            capacity,
            scope: String::new(),
            pending: Vec::with_capacity(capacity),
            committed_ops: 0,
            committed_batches: 0,
        })
    }

    /// Routes commit events to `observer`.
    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Labels subsequent commit events.
    pub fn set_scope(&mut self, scope: impl Into<String>) {
        self.scope = scope.into();
    }

    /// Appends `op`, committing the current batch first if it is full.
    ///
    /// # Errors
    ///
    /// Propagates the commit failure of the full batch; `op` is not staged in
    /// that case.
    pub fn stage(&mut self, op: WriteOp) -> types::Result<()> {
        if self.pending.len() >= self.capacity {
            self.commit_pending()?;
        }
        self.pending.push(op);
        Ok(())
    }

    /// Commits any partially filled batch.
    pub fn flush(&mut self) -> types::Result<()> {
        self.commit_pending()
    }

    /// Drops staged but uncommitted writes, returning how many were dropped.
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    /// Staged writes awaiting commit.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Operations committed successfully so far.
    pub fn committed_ops(&self) -> u64 {
        self.committed_ops
    }

    /// Batches committed successfully so far.
    pub fn committed_batches(&self) -> u64 {
        self.committed_batches
    }

    fn commit_pending(&mut self) -> types::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        // The batch is consumed whether or not the commit succeeds.
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.capacity));
        self.store.commit(&batch)?;
        self.committed_batches += 1;
        self.committed_ops += batch.len() as u64;
        let event = CommitEvent {
            scope: self.scope.clone(),
            batch_seq: self.committed_batches,
            batch_ops: batch.len(),
            committed_ops: self.committed_ops,
        };
        debug!(
            scope = %event.scope,
            batch = event.batch_seq,
            ops = event.batch_ops,
            total = event.committed_ops,
            "committed batch"
        );
        self.observer.on_commit(&event);
        Ok(())
    }
}

/// Batches needed to write `records` operations at `capacity` per batch.
pub fn planned_batches(records: usize, capacity: usize) -> u64 {
    if capacity == 0 {
        return 0;
    }
    records.div_ceil(capacity) as u64
}
