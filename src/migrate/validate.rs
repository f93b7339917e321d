//! Read-only comparison of migrated buckets against their source size.

use tracing::{info, warn};

use crate::migrate::group::group_documents;
use crate::migrate::options::MigrationOptions;
use crate::migrate::progress::{Phase, ProgressObserver};
use crate::migrate::report::{Validation, VerifyReport};
use crate::migrate::util::{enter, scan};
use crate::migrate::Result;
use crate::store::DocumentStore;
use crate::types::CollectionPath;

/// Re-reads `target` and compares its size with `expected`.
///
/// Never writes and never retries; a failed read is recorded on the result.
pub fn validate_bucket(
    store: &dyn DocumentStore,
    key: &str,
    target: &CollectionPath,
    expected: usize,
) -> Validation {
    let (found, error) = match store.list_documents(target) {
        Ok(docs) => (Some(docs.len()), None),
        Err(err) => (None, Some(err.to_string())),
    };
    let validation = Validation {
        key: key.to_string(),
        target: target.to_string(),
        expected,
        found,
        error,
    };
    if !validation.matches() {
        warn!(
            key,
            target = %validation.target,
            expected,
            found = ?validation.found,
            error = ?validation.error,
            "bucket validation mismatch"
        );
    }
    validation
}

/// Validates the current destination of every bucket in the source
/// collection without writing anything.
///
/// # Errors
///
/// Returns an error only if the options are invalid or the source scan
/// fails.
pub fn verify_migration(
    store: &dyn DocumentStore,
    opts: &MigrationOptions,
    observer: &dyn ProgressObserver,
) -> Result<VerifyReport> {
    opts.validate()?;
    let source = opts.source()?;
    let docs = scan(store, &source, observer)?;
    enter(observer, Phase::Grouping);
    let grouping = group_documents(docs, &opts.group_key);

    enter(observer, Phase::Validating);
    let validations: Vec<Validation> = grouping
        .buckets
        .iter()
        .map(|bucket| match opts.target_for(&bucket.key) {
            Ok(target) => validate_bucket(store, &bucket.key, &target, bucket.len()),
            Err(err) => Validation {
                key: bucket.key.clone(),
                target: String::new(),
                expected: bucket.len(),
                found: None,
                error: Some(err.to_string()),
            },
        })
        .collect();

    enter(observer, Phase::Reporting);
    let success = validations.iter().all(Validation::matches);
    info!(
        source = %source,
        buckets = validations.len(),
        success,
        "verification finished"
    );
    Ok(VerifyReport {
        backend: store.describe(),
        source: source.to_string(),
        success,
        total_records: grouping.total,
        skipped_records: grouping.skipped.len(),
        validations,
    })
}
