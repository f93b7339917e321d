//! Destructive removal of the flat source collection after a migration.

use std::time::Instant;

use tracing::{info, warn};

use crate::migrate::batch::BatchWriter;
use crate::migrate::group::group_key_of;
use crate::migrate::options::MigrationOptions;
use crate::migrate::progress::{Phase, ProgressObserver};
use crate::migrate::report::CleanupReport;
use crate::migrate::util::{enter, scan, timestamp_now};
use crate::migrate::Result;
use crate::store::DocumentStore;
use crate::types::{self, CollectionPath, Document, WriteOp};

/// Records in `docs` that a migration run with `opts` never copies: those
/// without a usable group key and those whose key cannot form a target path.
pub fn count_unmigrated(docs: &[Document], opts: &MigrationOptions) -> usize {
    docs.iter()
        .filter(|doc| match group_key_of(&doc.fields, &opts.group_key) {
            Some(key) => opts.target_for(&key).is_err(),
            None => true,
        })
        .count()
}

/// Deletes every document of the source collection and verifies that the
/// collection is empty afterwards.
///
/// Records the migration could not copy (no group key, or a key that is not
/// a valid path segment) are deleted too; their count is reported in
/// [`CleanupReport::unmigrated_records`]. An empty source collection is a
/// no-op that reports success.
///
/// # Errors
///
/// Returns an error only if the options are invalid or the initial scan
/// fails. Commit and verification failures are recorded on the report.
pub fn cleanup(
    store: &dyn DocumentStore,
    opts: &MigrationOptions,
    observer: &dyn ProgressObserver,
) -> Result<CleanupReport> {
    opts.validate()?;
    let start = Instant::now();
    let started_at = timestamp_now();
    let source = opts.source()?;

    let docs = scan(store, &source, observer)?;
    let mut report = CleanupReport {
        backend: store.describe(),
        source: source.to_string(),
        started_at,
        duration_ms: 0.0,
        dry_run: opts.dry_run,
        already_empty: docs.is_empty(),
        total_found: docs.len(),
        unmigrated_records: count_unmigrated(&docs, opts),
        deleted: 0,
        batches: 0,
        remaining: None,
        verified_empty: false,
        error: None,
    };

    if report.already_empty {
        info!(source = %source, "source collection already empty; nothing to delete");
        report.remaining = Some(0);
        report.verified_empty = true;
        enter(observer, Phase::Reporting);
        report.duration_ms = start.elapsed().as_secs_f64() * 1_000.0;
        return Ok(report);
    }

    if report.unmigrated_records > 0 {
        warn!(
            records = report.unmigrated_records,
            group_key = %opts.group_key,
            "deleting records that were never migrated"
        );
    }

    if opts.dry_run {
        report.remaining = Some(report.total_found);
        enter(observer, Phase::Reporting);
        report.duration_ms = start.elapsed().as_secs_f64() * 1_000.0;
        return Ok(report);
    }

    let mut writer = BatchWriter::new(store, opts.batch_size)?.with_observer(observer);
    writer.set_scope("cleanup");
    enter(observer, Phase::Writing);
    if let Err(err) = delete_all(&mut writer, observer, &source, &docs) {
        let dropped = writer.discard();
        warn!(source = %source, error = %err, dropped, "cleanup pass failed");
        report.error = Some(err.to_string());
    }
    report.deleted = writer.committed_ops();
    report.batches = writer.committed_batches();

    enter(observer, Phase::Verifying);
    match store.list_documents(&source) {
        Ok(left) => {
            report.remaining = Some(left.len());
            report.verified_empty = left.is_empty();
        }
        Err(err) => {
            warn!(source = %source, error = %err, "post-cleanup verification read failed");
            if report.error.is_none() {
                report.error = Some(err.to_string());
            }
        }
    }

    enter(observer, Phase::Reporting);
    report.duration_ms = start.elapsed().as_secs_f64() * 1_000.0;
    info!(
        source = %source,
        deleted = report.deleted,
        batches = report.batches,
        remaining = ?report.remaining,
        verified_empty = report.verified_empty,
        "cleanup finished"
    );
    Ok(report)
}

fn delete_all(
    writer: &mut BatchWriter<'_>,
    observer: &dyn ProgressObserver,
    source: &CollectionPath,
    docs: &[Document],
) -> types::Result<()> {
    for doc in docs {
        writer.stage(WriteOp::Delete {
            path: source.doc(&doc.id)?,
        })?;
    }
    enter(observer, Phase::Flushing);
    writer.flush()
}
