use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::migrate::{group_key_of, BatchWriter, MigrateError, ProgressObserver};
use crate::store::DocumentStore;
use crate::types::{CollectionPath, Document, StoreError, WriteOp};

/// Configuration for importing documents from a JSON file.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// JSON file to read: either `{ id: fields }` or `[ { id_field: .., .. } ]`.
    pub path: PathBuf,
    /// Destination collection (may be nested, e.g. `events/E1/agendaSlots`).
    pub collection: String,
    /// Field carrying the document id in the array form; removed on import.
    pub id_field: String,
    /// Writes per committed batch.
    pub batch_size: usize,
}

/// Summary statistics from an import operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    /// Documents written.
    pub documents_imported: u64,
    /// Batches committed.
    pub batches: u64,
}

/// Configuration for exporting a collection to a JSON file.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Output file.
    pub path: PathBuf,
    /// Collection to export.
    pub collection: String,
}

/// Summary statistics from an export operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    /// Documents written to the output file.
    pub documents_exported: u64,
}

/// Error type for CLI import/export operations.
#[derive(Error, Debug)]
pub enum CliError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),
    /// IO error from file operations.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON parsing or writing error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Migration layer error.
    #[error(transparent)]
    Migrate(#[from] MigrateError),
    /// Storage layer error.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Upserts every document of `cfg.path` into `cfg.collection`.
///
/// # Errors
///
/// Fails before writing anything if the file cannot be parsed or a row has no
/// usable id (missing, or not a valid path segment). A commit failure stops
/// the import; earlier batches stay committed.
pub fn run_import(
    store: &dyn DocumentStore,
    cfg: &ImportConfig,
    observer: &dyn ProgressObserver,
) -> Result<ImportSummary, CliError> {
    let collection = CollectionPath::parse(&cfg.collection)?;
    let file = fs::File::open(&cfg.path)?;
    let raw: Value = serde_json::from_reader(BufReader::new(file))?;
    // Every id must form a valid path before the first batch goes out.
    let ops = parse_documents(raw, &cfg.id_field)?
        .into_iter()
        .map(|doc| {
            Ok(WriteOp::Set {
                path: collection.doc(&doc.id)?,
                fields: doc.fields,
            })
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    let mut writer = BatchWriter::new(store, cfg.batch_size)?.with_observer(observer);
    writer.set_scope(format!("import {collection}"));
    for op in ops {
        writer.stage(op)?;
    }
    writer.flush()?;

    Ok(ImportSummary {
        documents_imported: writer.committed_ops(),
        batches: writer.committed_batches(),
    })
}

/// Writes every document of `cfg.collection` to `cfg.path` as `{ id: fields }`.
///
/// # Errors
///
/// Returns an error if the collection cannot be listed or the file cannot be
/// written.
pub fn run_export(store: &dyn DocumentStore, cfg: &ExportConfig) -> Result<ExportSummary, CliError> {
    let collection = CollectionPath::parse(&cfg.collection)?;
    let docs = store.list_documents(&collection)?;
    let mut out = Map::new();
    for doc in &docs {
        out.insert(doc.id.clone(), Value::Object(doc.fields.clone()));
    }

    if let Some(parent) = cfg.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(fs::File::create(&cfg.path)?);
    serde_json::to_writer_pretty(&mut writer, &Value::Object(out))?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    Ok(ExportSummary {
        documents_exported: docs.len() as u64,
    })
}

fn parse_documents(raw: Value, id_field: &str) -> Result<Vec<Document>, CliError> {
    match raw {
        Value::Object(map) => map
            .into_iter()
            .map(|(id, value)| match value {
                Value::Object(fields) => Ok(Document::new(id, fields)),
                other => Err(CliError::Message(format!(
                    "document '{id}' must be a JSON object, found {}",
                    json_kind(&other)
                ))),
            })
            .collect(),
        Value::Array(rows) => rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| {
                let Value::Object(mut fields) = row else {
                    return Err(CliError::Message(format!(
                        "row {idx} must be a JSON object"
                    )));
                };
                let id = group_key_of(&fields, id_field).ok_or_else(|| {
                    CliError::Message(format!("row {idx} has no usable '{id_field}' field"))
                })?;
                fields.remove(id_field);
                Ok(Document::new(id, fields))
            })
            .collect(),
        other => Err(CliError::Message(format!(
            "import file must hold a JSON object or array, found {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
