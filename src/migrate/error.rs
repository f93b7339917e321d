use std::path::{Path, PathBuf};

use crate::types::StoreError;
use thiserror::Error;

/// Error type for migration, validation and cleanup runs.
///
/// Only failures that abort a whole run surface here. Per-bucket write
/// failures and validation mismatches are recorded in the reports instead.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// Database file not found at the specified path.
    #[error("database not found: {0}")]
    MissingDatabase(PathBuf),
    /// Options failed validation before any read.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    /// The initial full scan failed; no write was attempted.
    #[error("failed to scan collection {collection}: {source}")]
    Scan {
        /// Collection being scanned.
        collection: String,
        /// Underlying backend error.
        #[source]
        source: StoreError,
    },
    /// Backend error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

impl MigrateError {
    pub(crate) fn missing_database(path: impl AsRef<Path>) -> Self {
        MigrateError::MissingDatabase(path.as_ref().to_path_buf())
    }
}
