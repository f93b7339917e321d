use std::path::Path;
use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

use crate::migrate::error::{MigrateError, Result};
use crate::migrate::progress::{Phase, ProgressObserver};
use crate::store::{DocumentStore, FileStore, StoreOpenOptions};
use crate::types::{CollectionPath, Document};

/// Opens the file-backed database at `path` as a shared store handle.
///
/// # Errors
///
/// Returns [`MigrateError::MissingDatabase`] if the file doesn't exist and
/// `create_if_missing` is false, or the backend error if opening fails.
pub fn open_store(path: &Path, opts: &StoreOpenOptions) -> Result<Arc<dyn DocumentStore>> {
    if !path.exists() && !opts.create_if_missing {
        return Err(MigrateError::missing_database(path));
    }
    let store = FileStore::open(path, opts)?;
    Ok(Arc::new(store))
}

pub(crate) fn enter(observer: &dyn ProgressObserver, phase: Phase) {
    debug!(%phase, "entering phase");
    observer.on_phase(phase);
}

/// Full scan of `collection`. Any failure is fatal for the run.
pub(crate) fn scan(
    store: &dyn DocumentStore,
    collection: &CollectionPath,
    observer: &dyn ProgressObserver,
) -> Result<Vec<Document>> {
    enter(observer, Phase::Scanning);
    store
        .list_documents(collection)
        .map_err(|source| MigrateError::Scan {
            collection: collection.to_string(),
            source,
        })
}

pub(crate) fn timestamp_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
