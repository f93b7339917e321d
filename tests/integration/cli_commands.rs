#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{json, Value};
use tempfile::TempDir;

struct Workspace {
    dir: TempDir,
    db: PathBuf,
    config: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let db = dir.path().join("agenda.json");
        let config = dir.path().join("config.toml");
        Self { dir, db, config }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("agenda-migrate");
        cmd.env("AGENDA_MIGRATE_CONFIG", &self.config)
            .env_remove("RUST_LOG");
        cmd
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self
            .cmd()
            .arg("--db")
            .arg(&self.db)
            .args(["--format", "json"])
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&output).expect("valid json")
    }

    fn seed(&self, keyed_a: usize, keyed_b: usize, unkeyed: usize) {
        let mut rows = Vec::new();
        for i in 0..keyed_a {
            rows.push(json!({ "id": format!("a{i:03}"), "eventId": "A", "title": "talk" }));
        }
        for i in 0..keyed_b {
            rows.push(json!({ "id": format!("b{i:03}"), "eventId": "B", "title": "panel" }));
        }
        for i in 0..unkeyed {
            rows.push(json!({ "id": format!("x{i}"), "title": "lost" }));
        }
        let file = self.path("slots.json");
        write_json(&file, &Value::Array(rows));
        let summary = self.json(&[
            "import",
            file.to_str().expect("utf8 path"),
            "--collection",
            "agendaSlots",
            "--create",
        ]);
        assert_eq!(
            summary["documents_imported"].as_u64(),
            Some((keyed_a + keyed_b + unkeyed) as u64)
        );
    }
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_vec(value).expect("encode")).expect("write fixture");
}

#[test]
fn full_run_through_the_cli() {
    let ws = Workspace::new();
    ws.seed(460, 40, 2);

    let report = ws.json(&["migrate"]);
    assert_eq!(report["total_records"], 502);
    assert_eq!(report["skipped_records"], 2);
    assert_eq!(report["committed_batches"], 3);
    let buckets = report["buckets"].as_array().expect("buckets");
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0]["key"], "A");
    assert_eq!(buckets[0]["target"], "events/A/agendaSlots");
    assert_eq!(buckets[0]["validation"]["found"], 460);

    let verify = ws.json(&["verify"]);
    assert_eq!(verify["success"], true);

    let cleanup = ws.json(&["cleanup", "--yes"]);
    assert_eq!(cleanup["deleted"], 502);
    assert_eq!(cleanup["unmigrated_records"], 2);
    assert_eq!(cleanup["verified_empty"], true);

    let out = ws.path("event-b.json");
    let export = ws.json(&[
        "export",
        out.to_str().expect("utf8 path"),
        "--collection",
        "events/B/agendaSlots",
    ]);
    assert_eq!(export["documents_exported"], 40);
    let exported: Value =
        serde_json::from_slice(&fs::read(&out).expect("read export")).expect("json");
    assert_eq!(exported["b007"], json!({ "title": "panel" }));
}

#[test]
fn verify_exits_with_two_on_mismatch() {
    let ws = Workspace::new();
    ws.seed(3, 0, 0);
    ws.cmd()
        .arg("--db")
        .arg(&ws.db)
        .arg("verify")
        .assert()
        .code(2);
}

#[test]
fn missing_database_is_a_fatal_error() {
    let ws = Workspace::new();
    let output = ws
        .cmd()
        .arg("--db")
        .arg(ws.path("nope.json"))
        .arg("migrate")
        .assert()
        .code(1)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&output);
    assert!(stderr.contains("error: database not found"), "{stderr}");
}

#[test]
fn invalid_batch_size_is_rejected() {
    let ws = Workspace::new();
    ws.seed(1, 0, 0);
    ws.cmd()
        .arg("--db")
        .arg(&ws.db)
        .args(["--batch-size", "501", "migrate"])
        .assert()
        .code(1);
}

#[test]
fn dry_runs_leave_the_database_alone() {
    let ws = Workspace::new();
    ws.seed(5, 5, 1);
    let before = fs::read(&ws.db).expect("read db");

    let report = ws.json(&["migrate", "--dry-run"]);
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["committed_ops"], 0);
    let cleanup = ws.json(&["cleanup", "--dry-run"]);
    assert_eq!(cleanup["total_found"], 11);

    assert_eq!(fs::read(&ws.db).expect("read db"), before);
}

#[test]
fn cleanup_without_yes_waits_out_the_grace_period() {
    let ws = Workspace::new();
    ws.seed(2, 0, 1);
    let output = ws
        .cmd()
        .arg("--db")
        .arg(&ws.db)
        .args(["--quiet", "cleanup", "--grace-secs", "0"])
        .assert()
        .success()
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("never migrated"), "{stderr}");
    assert!(String::from_utf8_lossy(&output.stdout).contains("verified empty"));
}

#[test]
fn profiles_supply_database_and_collections() {
    let ws = Workspace::new();
    let file = ws.path("sessions.json");
    write_json(
        &file,
        &json!({
            "s1": { "conferenceId": "C1" },
            "s2": { "conferenceId": "C1" },
            "s3": { "conferenceId": 7 },
        }),
    );
    ws.cmd()
        .arg("--db")
        .arg(&ws.db)
        .args(["import", file.to_str().expect("utf8 path")])
        .args(["--collection", "sessions", "--create"])
        .assert()
        .success();

    ws.cmd()
        .args(["profile", "set", "conf", "--profile-db"])
        .arg(&ws.db)
        .args([
            "--profile-source",
            "sessions",
            "--profile-group-key",
            "conferenceId",
            "--profile-parent",
            "conferences",
            "--profile-subcollection",
            "sessions",
        ])
        .assert()
        .success();
    ws.cmd().args(["profile", "use", "conf"]).assert().success();
    assert!(ws.config.exists());

    let output = ws
        .cmd()
        .args(["--format", "json", "migrate"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(report["source"], "sessions");
    let targets: Vec<&str> = report["buckets"]
        .as_array()
        .expect("buckets")
        .iter()
        .filter_map(|b| b["target"].as_str())
        .collect();
    assert_eq!(targets, ["conferences/C1/sessions", "conferences/7/sessions"]);
}

#[test]
fn completions_are_generated() {
    let ws = Workspace::new();
    let output = ws
        .cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("agenda-migrate"));
}
