#![allow(missing_docs)]

use agenda_migrate::{
    migrate::{cleanup, migrate, MigrationOptions, NoProgress},
    store::{DocumentStore, FaultPlan, MemoryStore},
    types::{CollectionPath, Document, Fields},
};
use serde_json::Value;

fn seed(store: &MemoryStore, keyed: usize, unkeyed: usize) {
    let source = CollectionPath::root("agendaSlots").expect("source path");
    let keyed_docs = (0..keyed).map(|i| {
        let mut fields = Fields::new();
        fields.insert("eventId".into(), Value::String(format!("E{}", i % 3)));
        Document::new(format!("k{i:05}"), fields)
    });
    let unkeyed_docs = (0..unkeyed).map(|i| Document::new(format!("u{i:05}"), Fields::new()));
    store
        .insert_all(&source, keyed_docs.chain(unkeyed_docs))
        .expect("seed");
}

fn source_len(store: &MemoryStore) -> usize {
    store
        .list_documents(&CollectionPath::root("agendaSlots").expect("source path"))
        .expect("list")
        .len()
}

#[test]
fn empty_source_is_a_successful_no_op() {
    let store = MemoryStore::new();
    let report = cleanup(&store, &MigrationOptions::default(), &NoProgress).expect("cleanup");

    assert!(report.already_empty);
    assert!(report.verified_empty);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.batches, 0);
    assert!(report.error.is_none());
    assert!(store.commit_sizes().is_empty());
}

#[test]
fn deletes_everything_in_bounded_batches() {
    let store = MemoryStore::new();
    seed(&store, 1_000, 0);

    let report = cleanup(&store, &MigrationOptions::default(), &NoProgress).expect("cleanup");

    assert_eq!(report.total_found, 1_000);
    assert_eq!(report.deleted, 1_000);
    assert_eq!(report.batches, 3);
    assert_eq!(store.commit_sizes(), vec![450, 450, 100]);
    assert_eq!(report.remaining, Some(0));
    assert!(report.verified_empty);
    assert_eq!(source_len(&store), 0);
}

#[test]
fn reports_records_that_were_never_migrated() {
    let store = MemoryStore::new();
    seed(&store, 20, 4);

    let report = cleanup(&store, &MigrationOptions::default(), &NoProgress).expect("cleanup");

    assert_eq!(report.unmigrated_records, 4);
    assert_eq!(report.deleted, 24);
    assert!(report.verified_empty);
}

#[test]
fn keys_that_cannot_form_a_target_count_as_unmigrated() {
    let store = MemoryStore::new();
    seed(&store, 6, 0);
    let source = CollectionPath::root("agendaSlots").expect("source path");
    let mut fields = Fields::new();
    fields.insert("eventId".into(), Value::String("bad/key".into()));
    store
        .insert_all(&source, [Document::new("slash", fields)])
        .expect("seed invalid key");
    let opts = MigrationOptions::default();

    let migrated = migrate(&store, &opts, &NoProgress).expect("migrate");
    assert_eq!(migrated.error_count(), 1);
    assert_eq!(migrated.skipped_records, 0);

    let report = cleanup(&store, &opts, &NoProgress).expect("cleanup");
    assert_eq!(report.unmigrated_records, 1);
    assert_eq!(report.deleted, 7);
}

#[test]
fn dry_run_deletes_nothing() {
    let store = MemoryStore::new();
    seed(&store, 10, 1);
    let opts = MigrationOptions {
        dry_run: true,
        ..MigrationOptions::default()
    };

    let report = cleanup(&store, &opts, &NoProgress).expect("dry run");

    assert_eq!(report.total_found, 11);
    assert_eq!(report.unmigrated_records, 1);
    assert_eq!(report.remaining, Some(11));
    assert!(!report.verified_empty);
    assert!(store.commit_sizes().is_empty());
}

#[test]
fn commit_failure_is_recorded_and_leftovers_are_counted() {
    let store = MemoryStore::new();
    seed(&store, 900, 0);
    store.set_faults(FaultPlan::new().fail_commit_attempt(2));

    let report = cleanup(&store, &MigrationOptions::default(), &NoProgress).expect("cleanup");

    assert!(report.error.is_some());
    assert_eq!(report.deleted, 450);
    assert_eq!(report.remaining, Some(450));
    assert!(!report.verified_empty);
}

#[test]
fn cleanup_after_migration_keeps_destinations() {
    let store = MemoryStore::new();
    seed(&store, 30, 0);
    let opts = MigrationOptions::default();
    migrate(&store, &opts, &NoProgress).expect("migrate");

    let report = cleanup(&store, &opts, &NoProgress).expect("cleanup");
    assert!(report.verified_empty);

    let migrated: usize = (0..3)
        .map(|e| {
            let target = opts.target_for(&format!("E{e}")).expect("target");
            store.list_documents(&target).expect("list").len()
        })
        .sum();
    assert_eq!(migrated, 30);
}
