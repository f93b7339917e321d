use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::store::MAX_BATCH_OPS;
use crate::types::{CollectionPath, Document, Fields, Result, StoreError, WriteOp};

/// Point-in-time contents of a document database, keyed by full document path.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    documents: BTreeMap<String, Fields>,
}

impl Snapshot {
    /// Empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents directly inside `collection`, ordered by id.
    pub fn list(&self, collection: &CollectionPath) -> Vec<Document> {
        let prefix = format!("{collection}/");
        self.documents
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .filter_map(|(path, fields)| {
                let id = &path[prefix.len()..];
                (!id.contains('/')).then(|| Document::new(id, fields.clone()))
            })
            .collect()
    }

    /// Fields of the document at `path`, if present.
    pub fn get(&self, path: &str) -> Option<&Fields> {
        self.documents.get(path)
    }

    /// Full paths of every stored document, in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.documents.keys().map(String::as_str)
    }

    /// Total number of documents across all collections.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// True when no document is stored.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Applies a batch, rejecting it whole if it exceeds [`MAX_BATCH_OPS`].
    pub fn apply(&mut self, ops: &[WriteOp]) -> Result<()> {
        if ops.len() > MAX_BATCH_OPS {
            return Err(StoreError::BatchTooLarge {
                ops: ops.len(),
                max: MAX_BATCH_OPS,
            });
        }
        for op in ops {
            match op {
                WriteOp::Set { path, fields } => {
                    self.documents.insert(path.to_string(), fields.clone());
                }
                WriteOp::Delete { path } => {
                    self.documents.remove(&path.to_string());
                }
            }
        }
        Ok(())
    }
}
