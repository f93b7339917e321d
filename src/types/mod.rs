//! Core document types shared by the store backends and the migration passes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field map of a single document.
pub type Fields = Map<String, Value>;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A collection or document path segment is empty or contains `/`.
    #[error("invalid path segment '{segment}' in {context}")]
    InvalidPath {
        /// Offending segment.
        segment: String,
        /// Path being built when the segment was rejected.
        context: String,
    },
    /// A batch exceeded the backend ceiling and was not applied.
    #[error("batch of {ops} operations exceeds the backend limit of {max}")]
    BatchTooLarge {
        /// Operations in the rejected batch.
        ops: usize,
        /// Maximum operations accepted per batch.
        max: usize,
    },
    /// The backend refused a commit.
    #[error("commit rejected: {0}")]
    CommitRejected(String),
    /// The backend could not be reached or read.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// The persisted database file is malformed.
    #[error("corrupt database file: {0}")]
    Corrupt(String),
    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON encoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn check_segment(segment: &str, context: impl FnOnce() -> String) -> Result<()> {
    if segment.is_empty() || segment.contains('/') {
        return Err(StoreError::InvalidPath {
            segment: segment.to_string(),
            context: context(),
        });
    }
    Ok(())
}

/// Location of a collection, possibly nested under a document
/// (`events/E1/agendaSlots`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Top-level collection.
    pub fn root(name: &str) -> Result<Self> {
        check_segment(name, || format!("collection '{name}'"))?;
        Ok(Self(name.to_string()))
    }

    /// Parses a full `a/b/c` collection path (odd number of segments).
    pub fn parse(raw: &str) -> Result<Self> {
        let segments: Vec<&str> = raw.split('/').collect();
        for segment in &segments {
            check_segment(segment, || format!("collection path '{raw}'"))?;
        }
        if segments.len() % 2 == 0 {
            return Err(StoreError::InvalidPath {
                segment: segments.last().copied().unwrap_or_default().to_string(),
                context: format!("'{raw}' addresses a document, not a collection"),
            });
        }
        Ok(Self(raw.to_string()))
    }

    /// Document `id` inside this collection.
    pub fn doc(&self, id: &str) -> Result<DocumentPath> {
        check_segment(id, || format!("document id under '{}'", self.0))?;
        Ok(DocumentPath {
            collection: self.clone(),
            id: id.to_string(),
        })
    }

    /// Full path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CollectionPath> for String {
    fn from(path: CollectionPath) -> Self {
        path.0
    }
}

impl TryFrom<String> for CollectionPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        CollectionPath::parse(&value)
    }
}

/// Location of a single document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    collection: CollectionPath,
    id: String,
}

impl DocumentPath {
    /// Parses a full `collection/id[/sub/id...]` document path.
    pub fn parse(raw: &str) -> Result<Self> {
        let (collection, id) = raw.rsplit_once('/').ok_or_else(|| StoreError::InvalidPath {
            segment: raw.to_string(),
            context: "document path without a collection".to_string(),
        })?;
        CollectionPath::parse(collection)?.doc(id)
    }

    /// Subcollection `name` nested under this document.
    pub fn collection(&self, name: &str) -> Result<CollectionPath> {
        check_segment(name, || format!("subcollection under '{self}'"))?;
        Ok(CollectionPath(format!("{self}/{name}")))
    }

    /// Containing collection.
    pub fn parent(&self) -> &CollectionPath {
        &self.collection
    }

    /// Document identifier.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as returned by a collection listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier, unique within its collection.
    pub id: String,
    /// Field map.
    pub fields: Fields,
}

impl Document {
    /// Builds a document from an id and field map.
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// A single staged write.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    /// Create or fully overwrite the document at `path`.
    Set {
        /// Target location.
        path: DocumentPath,
        /// New field map.
        fields: Fields,
    },
    /// Remove the document at `path`; deleting a missing document succeeds.
    Delete {
        /// Target location.
        path: DocumentPath,
    },
}

impl WriteOp {
    /// Location touched by this write.
    pub fn path(&self) -> &DocumentPath {
        match self {
            WriteOp::Set { path, .. } | WriteOp::Delete { path } => path,
        }
    }
}
