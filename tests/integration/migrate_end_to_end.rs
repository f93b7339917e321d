#![allow(missing_docs)]

use agenda_migrate::{
    migrate::{migrate, verify_migration, MigrationOptions, NoProgress},
    store::{DocumentStore, FaultPlan, MemoryStore},
    types::{CollectionPath, Document, Fields},
};
use serde_json::{json, Value};

fn slot(id: String, event: Option<&str>, title: &str) -> Document {
    let mut fields = Fields::new();
    fields.insert("title".into(), Value::String(title.into()));
    fields.insert("startsAt".into(), json!("2024-05-01T09:00:00Z"));
    if let Some(event) = event {
        fields.insert("eventId".into(), Value::String(event.into()));
    }
    Document::new(id, fields)
}

/// 700 slots for event A, 300 for event B, 5 without an event id.
fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    let source = CollectionPath::root("agendaSlots").expect("source path");
    let mut docs = Vec::new();
    for i in 0..700 {
        docs.push(slot(format!("a{i:04}"), Some("A"), "talk"));
    }
    for i in 0..300 {
        docs.push(slot(format!("b{i:04}"), Some("B"), "workshop"));
    }
    for i in 0..5 {
        docs.push(slot(format!("x{i}"), None, "orphan"));
    }
    store.insert_all(&source, docs).expect("seed");
    store
}

fn count(store: &MemoryStore, path: &str) -> usize {
    store
        .list_documents(&CollectionPath::parse(path).expect("collection path"))
        .expect("list")
        .len()
}

#[test]
fn thousand_records_split_into_two_events() {
    let store = seeded_store();
    let report = migrate(&store, &MigrationOptions::default(), &NoProgress).expect("migrate");

    assert_eq!(report.total_records, 1005);
    assert_eq!(report.skipped_records, 5);
    assert_eq!(report.routed(), 1000);
    assert_eq!(report.error_count(), 0);
    assert_eq!(report.mismatch_count(), 0);
    assert!(report.is_clean());

    // buckets are written one after another and never share a batch
    assert_eq!(store.commit_sizes(), vec![450, 250, 300]);
    assert_eq!(report.committed_batches, 3);
    assert_eq!(report.committed_ops, 1000);

    let keys: Vec<&str> = report.buckets.iter().map(|b| b.key.as_str()).collect();
    assert_eq!(keys, ["A", "B"]);
    assert_eq!(report.buckets[0].batches, 2);
    assert_eq!(report.buckets[0].planned_batches, 2);
    assert_eq!(report.buckets[1].batches, 1);

    assert_eq!(count(&store, "events/A/agendaSlots"), 700);
    assert_eq!(count(&store, "events/B/agendaSlots"), 300);
    // the flat collection is left for the cleanup pass
    assert_eq!(count(&store, "agendaSlots"), 1005);

    let snapshot = store.snapshot();
    let copied = snapshot
        .get("events/A/agendaSlots/a0042")
        .expect("copied slot keeps its id");
    assert!(!copied.contains_key("eventId"));
    assert_eq!(copied.get("title"), Some(&json!("talk")));
}

#[test]
fn failing_bucket_does_not_stop_the_others() {
    let store = seeded_store();
    store.set_faults(FaultPlan::new().fail_commits_under("events/B"));

    let report = migrate(&store, &MigrationOptions::default(), &NoProgress).expect("migrate");

    assert_eq!(report.error_count(), 1);
    let a = &report.buckets[0];
    let b = &report.buckets[1];
    assert!(a.error.is_none());
    assert!(a.validation.as_ref().is_some_and(|v| v.matches()));
    assert!(b.error.as_deref().is_some_and(|e| e.contains("events/B")));
    assert_eq!(b.written, 0);
    let validation = b.validation.as_ref().expect("B is still validated");
    assert_eq!(validation.found, Some(0));
    assert!(!validation.matches());
    assert_eq!(count(&store, "events/B/agendaSlots"), 0);
}

#[test]
fn partial_bucket_keeps_committed_batches() {
    let store = seeded_store();
    // second commit is A's tail of 250
    store.set_faults(FaultPlan::new().fail_commit_attempt(2));

    let report = migrate(&store, &MigrationOptions::default(), &NoProgress).expect("migrate");

    let a = &report.buckets[0];
    assert_eq!(a.written, 450);
    assert_eq!(a.batches, 1);
    assert!(a.error.is_some());
    assert_eq!(count(&store, "events/A/agendaSlots"), 450);
    assert!(report.buckets[1].error.is_none());
    assert_eq!(count(&store, "events/B/agendaSlots"), 300);
    assert_eq!(store.commit_sizes(), vec![450, 300]);
}

#[test]
fn rerun_is_idempotent() {
    let store = seeded_store();
    let opts = MigrationOptions::default();
    migrate(&store, &opts, &NoProgress).expect("first run");
    let after_first = store.snapshot();

    let second = migrate(&store, &opts, &NoProgress).expect("second run");
    assert!(second.is_clean());
    assert_eq!(store.snapshot(), after_first);
    assert_eq!(count(&store, "events/A/agendaSlots"), 700);

    let verify = verify_migration(&store, &opts, &NoProgress).expect("verify");
    assert!(verify.success);
    assert_eq!(verify.validations.len(), 2);
}

#[test]
fn dry_run_touches_nothing() {
    let store = seeded_store();
    let before = store.snapshot();
    let opts = MigrationOptions {
        dry_run: true,
        ..MigrationOptions::default()
    };
    let report = migrate(&store, &opts, &NoProgress).expect("dry run");

    assert!(report.dry_run);
    assert!(store.commit_sizes().is_empty());
    assert_eq!(store.snapshot(), before);
    assert_eq!(report.buckets[0].planned_batches, 2);
    assert!(report.buckets.iter().all(|b| b.validation.is_none()));
}

#[test]
fn verify_reports_mismatch_before_migration() {
    let store = seeded_store();
    let verify =
        verify_migration(&store, &MigrationOptions::default(), &NoProgress).expect("verify");
    assert!(!verify.success);
    assert!(verify.validations.iter().all(|v| v.found == Some(0)));
}

#[test]
fn unreachable_source_is_fatal() {
    let store = seeded_store();
    store.set_faults(FaultPlan::new().fail_listing_of("agendaSlots"));
    let err = migrate(&store, &MigrationOptions::default(), &NoProgress).unwrap_err();
    assert!(err.to_string().contains("agendaSlots"));
    assert!(store.commit_sizes().is_empty());
}
