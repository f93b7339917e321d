use serde::Serialize;

use crate::migrate::{MigrateError, Result};
use crate::store::MAX_BATCH_OPS;
use crate::types::CollectionPath;

/// Default number of writes per committed batch, kept below [`MAX_BATCH_OPS`].
pub const DEFAULT_BATCH_SIZE: usize = 450;

/// Collections and limits a migration or cleanup run operates on.
#[derive(Clone, Debug, Serialize)]
pub struct MigrationOptions {
    /// Flat collection holding the records to repartition.
    pub source_collection: String,
    /// Field whose value selects the destination bucket.
    pub group_key: String,
    /// Parent collection of the per-key documents.
    pub parent_collection: String,
    /// Subcollection created under each parent document.
    pub subcollection: String,
    /// Writes per committed batch.
    pub batch_size: usize,
    /// Plan only; stage no writes.
    pub dry_run: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            source_collection: "agendaSlots".to_string(),
            group_key: "eventId".to_string(),
            parent_collection: "events".to_string(),
            subcollection: "agendaSlots".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
        }
    }
}

impl MigrationOptions {
    /// Checks names and the batch size.
    ///
    /// # Errors
    ///
    /// Returns [`MigrateError::InvalidOptions`] for empty names, names
    /// containing `/`, or a batch size outside `1..=MAX_BATCH_OPS`.
    pub fn validate(&self) -> Result<()> {
        for (label, value) in [
            ("source collection", &self.source_collection),
            ("group key", &self.group_key),
            ("parent collection", &self.parent_collection),
            ("subcollection", &self.subcollection),
        ] {
            if value.is_empty() {
                return Err(MigrateError::InvalidOptions(format!("{label} is empty")));
            }
            if value.contains('/') {
                return Err(MigrateError::InvalidOptions(format!(
                    "{label} '{value}' must be a single path segment"
                )));
            }
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_OPS {
            return Err(MigrateError::InvalidOptions(format!(
                "batch size {} must be between 1 and {MAX_BATCH_OPS}",
                self.batch_size
            )));
        }
        Ok(())
    }

    /// The flat source collection.
    pub fn source(&self) -> Result<CollectionPath> {
        Ok(CollectionPath::root(&self.source_collection)?)
    }

    /// Destination collection for records whose group key equals `key`.
    pub fn target_for(&self, key: &str) -> Result<CollectionPath> {
        let parent = CollectionPath::root(&self.parent_collection)?;
        Ok(parent.doc(key)?.collection(&self.subcollection)?)
    }
}
