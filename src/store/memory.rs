use parking_lot::Mutex;

use crate::store::{DocumentStore, Snapshot};
use crate::types::{CollectionPath, Document, Result, StoreError, WriteOp};

/// Failures to inject into a [`MemoryStore`].
#[derive(Clone, Debug, Default)]
pub struct FaultPlan {
    fail_commits_under: Vec<String>,
    fail_commit_attempt: Option<u64>,
    fail_listing_of: Vec<String>,
}

impl FaultPlan {
    /// No injected failures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects every commit that writes below `prefix` (a collection or
    /// document path).
    pub fn fail_commits_under(mut self, prefix: impl Into<String>) -> Self {
        self.fail_commits_under.push(prefix.into());
        self
    }

    /// Rejects the `n`-th commit attempt (1-based), whatever it touches.
    pub fn fail_commit_attempt(mut self, n: u64) -> Self {
        self.fail_commit_attempt = Some(n);
        self
    }

    /// Makes listing `collection` fail as if the backend were unreachable.
    pub fn fail_listing_of(mut self, collection: impl Into<String>) -> Self {
        self.fail_listing_of.push(collection.into());
        self
    }

    fn rejects_commit(&self, attempt: u64, ops: &[WriteOp]) -> Option<String> {
        if self.fail_commit_attempt == Some(attempt) {
            return Some(format!("injected failure on commit attempt {attempt}"));
        }
        for op in ops {
            let path = op.path().to_string();
            if let Some(prefix) = self
                .fail_commits_under
                .iter()
                .find(|prefix| path.starts_with(&format!("{prefix}/")))
            {
                return Some(format!("injected failure for writes under {prefix}"));
            }
        }
        None
    }
}

#[derive(Default)]
struct MemoryInner {
    snapshot: Snapshot,
    faults: FaultPlan,
    commit_attempts: u64,
    commit_sizes: Vec<usize>,
}

/// In-process document store.
///
/// Commits are applied under a single lock, so they are atomic with respect to
/// readers. Every successful commit size is recorded for inspection.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    /// Empty store without injected faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds documents into `collection` without going through a batch.
    pub fn insert_all(
        &self,
        collection: &CollectionPath,
        docs: impl IntoIterator<Item = Document>,
    ) -> Result<()> {
        let mut guard = self.inner.lock();
        for doc in docs {
            let path = collection.doc(&doc.id)?;
            guard.snapshot.apply(&[WriteOp::Set {
                path,
                fields: doc.fields,
            }])?;
        }
        Ok(())
    }

    /// Replaces the injected fault plan.
    pub fn set_faults(&self, faults: FaultPlan) {
        self.inner.lock().faults = faults;
    }

    /// Sizes of every successful commit, in order.
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.inner.lock().commit_sizes.clone()
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot.clone()
    }
}

impl DocumentStore for MemoryStore {
    fn list_documents(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        let guard = self.inner.lock();
        if guard
            .faults
            .fail_listing_of
            .iter()
            .any(|c| c == collection.as_str())
        {
            return Err(StoreError::Unavailable(format!(
                "injected failure listing {collection}"
            )));
        }
        Ok(guard.snapshot.list(collection))
    }

    fn commit(&self, ops: &[WriteOp]) -> Result<()> {
        let mut guard = self.inner.lock();
        guard.commit_attempts += 1;
        let attempt = guard.commit_attempts;
        if let Some(reason) = guard.faults.rejects_commit(attempt, ops) {
            return Err(StoreError::CommitRejected(reason));
        }
        guard.snapshot.apply(ops)?;
        guard.commit_sizes.push(ops.len());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
