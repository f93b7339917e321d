#![allow(missing_docs)]

use std::fs;

use agenda_migrate::{
    migrate::{
        cleanup, migrate, open_store, verify_migration, MigrateError, MigrationOptions,
        NoProgress,
    },
    store::{DocumentStore, FileStore, StoreOpenOptions},
};
use serde_json::json;
use tempfile::TempDir;

fn seed_file(dir: &TempDir, slots: usize) -> std::path::PathBuf {
    let path = dir.path().join("agenda.json");
    let mut documents = serde_json::Map::new();
    for i in 0..slots {
        documents.insert(
            format!("agendaSlots/s{i:04}"),
            json!({ "eventId": if i % 2 == 0 { "even" } else { "odd" }, "room": i }),
        );
    }
    fs::write(
        &path,
        serde_json::to_string(&json!({ "documents": documents })).expect("encode"),
    )
    .expect("write seed file");
    path
}

#[test]
fn migration_survives_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let path = seed_file(&dir, 101);
    let opts = MigrationOptions::default();

    {
        let store = open_store(&path, &StoreOpenOptions::default()).expect("open");
        let report = migrate(store.as_ref(), &opts, &NoProgress).expect("migrate");
        assert!(report.is_clean());
        assert_eq!(report.routed(), 101);
    }

    let reopened = open_store(&path, &StoreOpenOptions::default()).expect("reopen");
    let verify = verify_migration(reopened.as_ref(), &opts, &NoProgress).expect("verify");
    assert!(verify.success);
    let even = reopened
        .list_documents(&opts.target_for("even").expect("target"))
        .expect("list");
    assert_eq!(even.len(), 51);
    assert_eq!(even[0].fields.get("room"), Some(&json!(0)));
    assert!(!even[0].fields.contains_key("eventId"));

    let report = cleanup(reopened.as_ref(), &opts, &NoProgress).expect("cleanup");
    assert!(report.verified_empty);
    let again = FileStore::open(&path, &StoreOpenOptions::default()).expect("open again");
    assert!(again
        .list_documents(&opts.source().expect("source"))
        .expect("list")
        .is_empty());
}

#[test]
fn missing_database_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let err = open_store(&dir.path().join("absent.json"), &StoreOpenOptions::default())
        .err()
        .expect("missing file must fail");
    assert!(matches!(err, MigrateError::MissingDatabase(_)));

    let created = open_store(
        &dir.path().join("nested/new.json"),
        &StoreOpenOptions {
            create_if_missing: true,
        },
    )
    .expect("create");
    assert!(created.describe().ends_with("new.json"));
    assert!(dir.path().join("nested/new.json").exists());
}

#[test]
fn dry_run_leaves_file_bytes_unchanged() {
    let dir = TempDir::new().expect("tempdir");
    let path = seed_file(&dir, 12);
    let before = fs::read(&path).expect("read");
    let store = open_store(&path, &StoreOpenOptions::default()).expect("open");
    let opts = MigrationOptions {
        dry_run: true,
        ..MigrationOptions::default()
    };

    migrate(store.as_ref(), &opts, &NoProgress).expect("dry-run migrate");
    cleanup(store.as_ref(), &opts, &NoProgress).expect("dry-run cleanup");

    assert_eq!(fs::read(&path).expect("read"), before);
}
