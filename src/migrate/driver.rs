//! Repartitioning of the flat collection into per-key subcollections.

use std::time::Instant;

use tracing::{info, warn};

use crate::migrate::batch::{planned_batches, BatchWriter};
use crate::migrate::group::{group_documents, Bucket};
use crate::migrate::options::MigrationOptions;
use crate::migrate::progress::{Phase, ProgressObserver};
use crate::migrate::report::{BucketReport, MigrationReport};
use crate::migrate::util::{enter, scan, timestamp_now};
use crate::migrate::validate::validate_bucket;
use crate::migrate::Result;
use crate::store::DocumentStore;
use crate::types::{self, CollectionPath, WriteOp};

/// Copies every keyed record of the source collection to
/// `{parent}/{key}/{subcollection}/{id}`, dropping the group-key field, then
/// validates each destination.
///
/// A failure while writing one bucket is recorded on that bucket and the run
/// moves on to the next one. Batches committed before the failure stay
/// committed.
///
/// # Errors
///
/// Returns an error only if the options are invalid or the initial scan
/// fails, in which case nothing has been written.
pub fn migrate(
    store: &dyn DocumentStore,
    opts: &MigrationOptions,
    observer: &dyn ProgressObserver,
) -> Result<MigrationReport> {
    opts.validate()?;
    let start = Instant::now();
    let started_at = timestamp_now();
    let source = opts.source()?;

    let docs = scan(store, &source, observer)?;
    info!(source = %source, records = docs.len(), backend = %store.describe(), "scanned source collection");

    enter(observer, Phase::Grouping);
    let grouping = group_documents(docs, &opts.group_key);
    if !grouping.skipped.is_empty() {
        warn!(
            skipped = grouping.skipped.len(),
            group_key = %opts.group_key,
            "records without a group key are excluded from migration"
        );
    }

    let mut writer = BatchWriter::new(store, opts.batch_size)?.with_observer(observer);
    let mut buckets = Vec::with_capacity(grouping.buckets.len());
    let mut targets = Vec::with_capacity(grouping.buckets.len());

    for bucket in &grouping.buckets {
        let mut report = BucketReport {
            key: bucket.key.clone(),
            target: None,
            expected: bucket.len(),
            written: 0,
            batches: 0,
            planned_batches: planned_batches(bucket.len(), opts.batch_size),
            error: None,
            validation: None,
        };
        let target = match opts.target_for(&bucket.key) {
            Ok(target) => target,
            Err(err) => {
                warn!(key = %bucket.key, error = %err, "bucket key is not a valid path segment");
                report.error = Some(err.to_string());
                buckets.push(report);
                continue;
            }
        };
        report.target = Some(target.to_string());

        if !opts.dry_run {
            observer.on_bucket(&bucket.key, bucket.len());
            let ops_before = writer.committed_ops();
            let batches_before = writer.committed_batches();
            if let Err(err) = write_bucket(&mut writer, observer, &target, bucket, &opts.group_key) {
                let dropped = writer.discard();
                warn!(key = %bucket.key, error = %err, dropped, "bucket migration failed");
                report.error = Some(err.to_string());
            }
            report.written = writer.committed_ops() - ops_before;
            report.batches = writer.committed_batches() - batches_before;
            targets.push((buckets.len(), target));
        }
        buckets.push(report);
    }

    if !opts.dry_run {
        enter(observer, Phase::Validating);
        for (idx, target) in targets {
            let report = &mut buckets[idx];
            report.validation = Some(validate_bucket(store, &report.key, &target, report.expected));
        }
    }

    enter(observer, Phase::Reporting);
    let report = MigrationReport {
        backend: store.describe(),
        source: source.to_string(),
        started_at,
        duration_ms: start.elapsed().as_secs_f64() * 1_000.0,
        dry_run: opts.dry_run,
        total_records: grouping.total,
        skipped_records: grouping.skipped.len(),
        skipped_ids: grouping.skipped,
        buckets,
        committed_ops: writer.committed_ops(),
        committed_batches: writer.committed_batches(),
    };
    info!(
        buckets = report.buckets.len(),
        committed_ops = report.committed_ops,
        errors = report.error_count(),
        mismatches = report.mismatch_count(),
        skipped = report.skipped_records,
        dry_run = report.dry_run,
        "migration finished"
    );
    Ok(report)
}

fn write_bucket(
    writer: &mut BatchWriter<'_>,
    observer: &dyn ProgressObserver,
    target: &CollectionPath,
    bucket: &Bucket,
    group_key: &str,
) -> types::Result<()> {
    enter(observer, Phase::Writing);
    writer.set_scope(bucket.key.as_str());
    for doc in &bucket.documents {
        let mut fields = doc.fields.clone();
        fields.remove(group_key);
        writer.stage(WriteOp::Set {
            path: target.doc(&doc.id)?,
            fields,
        })?;
    }
    enter(observer, Phase::Flushing);
    writer.flush()
}
