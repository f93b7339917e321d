use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::store::{DocumentStore, Snapshot};
use crate::types::{CollectionPath, Document, DocumentPath, Result, StoreError, WriteOp};

/// Options used when opening a [`FileStore`].
#[derive(Clone, Debug, Default)]
pub struct StoreOpenOptions {
    /// Create an empty database file when none exists.
    pub create_if_missing: bool,
}

/// Document database persisted as a single JSON file.
///
/// Each commit writes the whole database to a temporary file in the same
/// directory and renames it over the original, so a batch is either fully on
/// disk or not at all.
pub struct FileStore {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
}

impl FileStore {
    /// Opens the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing (and `create_if_missing` is
    /// false), unreadable, or not a valid database.
    pub fn open(path: impl AsRef<Path>, opts: &StoreOpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = if !path.exists() && opts.create_if_missing {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let empty = Snapshot::new();
            persist(&path, &empty)?;
            empty
        } else {
            load(&path)?
        };
        debug!(path = %path.display(), documents = snapshot.len(), "opened file store");
        Ok(Self {
            path,
            snapshot: Mutex::new(snapshot),
        })
    }
}

impl DocumentStore for FileStore {
    fn list_documents(&self, collection: &CollectionPath) -> Result<Vec<Document>> {
        Ok(self.snapshot.lock().list(collection))
    }

    fn commit(&self, ops: &[WriteOp]) -> Result<()> {
        let mut guard = self.snapshot.lock();
        let mut next = guard.clone();
        next.apply(ops)?;
        persist(&self.path, &next)?;
        *guard = next;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

fn load(path: &Path) -> Result<Snapshot> {
    let contents = fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&contents)
        .map_err(|err| StoreError::Corrupt(format!("{}: {err}", path.display())))?;
    for key in snapshot.paths() {
        DocumentPath::parse(key).map_err(|err| {
            StoreError::Corrupt(format!("{}: bad document path: {err}", path.display()))
        })?;
    }
    Ok(snapshot)
}

fn persist(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, snapshot)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| StoreError::Io(err.error))?;
    Ok(())
}
