//! Binary entry point for the agenda-slot repartitioning CLI.
#![forbid(unsafe_code)]

#[path = "cli/config.rs"]
mod config;
#[path = "cli/ui.rs"]
mod ui;

use std::error::Error;
use std::io;
use std::path::PathBuf;

use agenda_migrate::{
    cli::import_export::{run_export, run_import, ExportConfig, ImportConfig},
    migrate::{
        cleanup, migrate, open_store, verify_migration, CleanupReport, MigrationOptions,
        MigrationReport, NoProgress, VerifyReport,
    },
    store::StoreOpenOptions,
};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

use config::{CliConfig, ProfileUpdate};
use ui::{format_duration, Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "agenda-migrate",
    version,
    about = "Repartition flat agenda slots into per-event subcollections",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        help = "Database file (overrides profile and config defaults)"
    )]
    db: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "AGENDA_MIGRATE_CONFIG",
        value_name = "FILE",
        help = "CLI config file"
    )]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Named profile from the CLI config")]
    profile: Option<String>,

    #[command(flatten)]
    collections: CollectionArgs,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for reports"
    )]
    format: OutputFormat,

    #[arg(long, global = true, value_enum, default_value_t = Theme::Auto)]
    theme: Theme,

    #[arg(short, long, global = true, help = "Suppress spinners and decorations")]
    quiet: bool,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Raise log verbosity (-v info, -vv debug)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct CollectionArgs {
    #[arg(long, global = true, help = "Flat source collection")]
    source: Option<String>,

    #[arg(long, global = true, help = "Field used to partition records")]
    group_key: Option<String>,

    #[arg(long, global = true, help = "Parent collection of the per-key documents")]
    parent: Option<String>,

    #[arg(long, global = true, help = "Subcollection created under each parent")]
    subcollection: Option<String>,

    #[arg(long, global = true, help = "Writes per committed batch (1..=500)")]
    batch_size: Option<usize>,
}

#[derive(Args, Debug)]
struct ImportCmd {
    #[arg(value_name = "FILE", help = "JSON file with the documents to import")]
    file: PathBuf,

    #[arg(long, help = "Destination collection path")]
    collection: String,

    #[arg(
        long,
        default_value = "id",
        help = "Field carrying the document id when the file is an array"
    )]
    id_field: String,

    #[arg(long, help = "Create the database file if it does not exist")]
    create: bool,
}

#[derive(Args, Debug)]
struct ExportCmd {
    #[arg(value_name = "FILE", help = "Output JSON file")]
    file: PathBuf,

    #[arg(long, help = "Collection path to export")]
    collection: String,
}

#[derive(Args, Debug)]
struct ProfileSetCmd {
    name: String,
    #[arg(long = "profile-db", value_name = "FILE")]
    database: Option<PathBuf>,
    #[arg(long = "profile-source")]
    source_collection: Option<String>,
    #[arg(long = "profile-group-key")]
    group_key: Option<String>,
    #[arg(long = "profile-parent")]
    parent_collection: Option<String>,
    #[arg(long = "profile-subcollection")]
    subcollection: Option<String>,
    #[arg(long = "profile-batch-size")]
    batch_size: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum ProfileCmd {
    /// List configured profiles
    List,
    /// Create or update a profile
    Set(ProfileSetCmd),
    /// Remove a profile
    Delete { name: String },
    /// Select the default profile (omit NAME to clear it)
    Use { name: Option<String> },
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy every keyed record into its per-key subcollection and validate counts
    Migrate {
        #[arg(long, help = "Plan the run without writing anything")]
        dry_run: bool,
    },
    /// Re-validate destination counts against the source collection
    Verify,
    /// Delete the flat source collection after a successful migration
    Cleanup {
        #[arg(long, help = "Count what would be deleted without deleting")]
        dry_run: bool,
        #[arg(long, help = "Skip the warning and grace period")]
        yes: bool,
        #[arg(long, default_value_t = 5, help = "Seconds to wait before deleting")]
        grace_secs: u64,
    },
    /// Upsert documents from a JSON file into a collection
    Import(ImportCmd),
    /// Write a collection to a JSON file
    Export(ExportCmd),
    /// Manage CLI config profiles
    #[command(subcommand)]
    Profile(ProfileCmd),
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    install_tracing(cli.verbose);
    let ui = Ui::new(cli.theme, cli.quiet);

    match &cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "agenda-migrate", &mut io::stdout());
            return Ok(());
        }
        Command::Profile(cmd) => return run_profile(&cli, cmd, &ui),
        _ => {}
    }

    let config = CliConfig::load(cli.config.clone())?;
    let (db_path, mut opts) = resolve_settings(&cli, &config)?;

    match &cli.command {
        Command::Migrate { dry_run } => {
            opts.dry_run = *dry_run;
            let store = open_store(&db_path, &StoreOpenOptions::default())?;
            let task = ui.task("Migrating");
            let report = migrate(store.as_ref(), &opts, &task)?;
            task.finish();
            emit(cli.format, &report, || print_migration_text(&ui, &report))?;
        }
        Command::Verify => {
            let store = open_store(&db_path, &StoreOpenOptions::default())?;
            let task = ui.task("Verifying");
            let report = verify_migration(store.as_ref(), &opts, &task)?;
            task.finish();
            emit(cli.format, &report, || print_verify_text(&ui, &report))?;
            if !report.success {
                std::process::exit(2);
            }
        }
        Command::Cleanup {
            dry_run,
            yes,
            grace_secs,
        } => {
            let store = open_store(&db_path, &StoreOpenOptions::default())?;
            if !*dry_run && !*yes {
                let preview = cleanup(
                    store.as_ref(),
                    &MigrationOptions {
                        dry_run: true,
                        ..opts.clone()
                    },
                    &NoProgress,
                )?;
                if !preview.already_empty {
                    if preview.unmigrated_records > 0 {
                        ui.warn(&format!(
                            "{} of {} records in '{}' were never migrated (missing or unusable '{}'); they will be lost",
                            preview.unmigrated_records,
                            preview.total_found,
                            opts.source_collection,
                            opts.group_key
                        ));
                    }
                    ui.warn(&format!(
                        "About to delete {} records from '{}'",
                        preview.total_found, opts.source_collection
                    ));
                    ui.countdown("Deleting", *grace_secs);
                }
            }
            opts.dry_run = *dry_run;
            let task = ui.task("Cleaning up");
            let report = cleanup(store.as_ref(), &opts, &task)?;
            task.finish();
            emit(cli.format, &report, || print_cleanup_text(&ui, &report))?;
        }
        Command::Import(cmd) => {
            let store = open_store(
                &db_path,
                &StoreOpenOptions {
                    create_if_missing: cmd.create,
                },
            )?;
            let import_cfg = ImportConfig {
                path: cmd.file.clone(),
                collection: cmd.collection.clone(),
                id_field: cmd.id_field.clone(),
                batch_size: opts.batch_size,
            };
            let task = ui.task("Importing");
            let summary = run_import(store.as_ref(), &import_cfg, &task)?;
            task.finish();
            emit(cli.format, &summary, || {
                ui.success(&format!(
                    "Imported {} documents into '{}' in {} batches",
                    summary.documents_imported, cmd.collection, summary.batches
                ))
            })?;
        }
        Command::Export(cmd) => {
            let store = open_store(&db_path, &StoreOpenOptions::default())?;
            let export_cfg = ExportConfig {
                path: cmd.file.clone(),
                collection: cmd.collection.clone(),
            };
            let summary = run_export(store.as_ref(), &export_cfg)?;
            emit(cli.format, &summary, || {
                ui.success(&format!(
                    "Exported {} documents from '{}' to {}",
                    summary.documents_exported,
                    cmd.collection,
                    cmd.file.display()
                ))
            })?;
        }
        Command::Profile(_) | Command::Completions { .. } => {}
    }

    Ok(())
}

fn install_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Flag, then profile, then config default, then built-in default.
fn resolve_settings(
    cli: &Cli,
    config: &CliConfig,
) -> Result<(PathBuf, MigrationOptions), Box<dyn Error>> {
    let profile = match cli.profile.as_deref() {
        Some(name) => Some(
            config
                .profile(name)
                .ok_or_else(|| format!("profile '{name}' not found"))?,
        ),
        None => config
            .default_profile_name()
            .and_then(|name| config.profile(name)),
    };

    let mut opts = MigrationOptions::default();
    if let Some(profile) = profile {
        profile.apply(&mut opts);
    }
    let args = &cli.collections;
    if let Some(source) = &args.source {
        opts.source_collection = source.clone();
    }
    if let Some(key) = &args.group_key {
        opts.group_key = key.clone();
    }
    if let Some(parent) = &args.parent {
        opts.parent_collection = parent.clone();
    }
    if let Some(sub) = &args.subcollection {
        opts.subcollection = sub.clone();
    }
    if let Some(size) = args.batch_size {
        opts.batch_size = size;
    }
    opts.validate()?;

    let db_path = cli
        .db
        .clone()
        .or_else(|| profile.and_then(|p| p.database.clone()))
        .or_else(|| config.default_db_path().cloned())
        .ok_or("no database given; pass --db or configure a profile")?;
    Ok((db_path, opts))
}

fn run_profile(cli: &Cli, cmd: &ProfileCmd, ui: &Ui) -> Result<(), Box<dyn Error>> {
    let mut config = CliConfig::load(cli.config.clone())?;
    match cmd {
        ProfileCmd::List => {
            let mut profiles: Vec<_> = config.profiles().cloned().collect();
            profiles.sort_by(|a, b| a.name.cmp(&b.name));
            let default = config.default_profile_name().map(str::to_string);
            emit(cli.format, &profiles, || {
                if profiles.is_empty() {
                    ui.info("No profiles configured");
                    return;
                }
                ui.list(
                    "Profiles",
                    profiles.iter().map(|p| {
                        let marker = if default.as_deref() == Some(p.name.as_str()) {
                            " (default)"
                        } else {
                            ""
                        };
                        let db = p
                            .database
                            .as_ref()
                            .map(|d| d.display().to_string())
                            .unwrap_or_else(|| "-".to_string());
                        format!("{}{marker}: db={db}", p.name)
                    }),
                );
            })?;
            return Ok(());
        }
        ProfileCmd::Set(set) => {
            if set.batch_size == Some(0) {
                return Err("profile batch size must be positive".into());
            }
            config.upsert_profile(
                &set.name,
                ProfileUpdate {
                    database: set.database.clone(),
                    source_collection: set.source_collection.clone(),
                    group_key: set.group_key.clone(),
                    parent_collection: set.parent_collection.clone(),
                    subcollection: set.subcollection.clone(),
                    batch_size: set.batch_size,
                },
            )?;
        }
        ProfileCmd::Delete { name } => config.delete_profile(name)?,
        ProfileCmd::Use { name } => config.set_default_profile(name.as_deref())?,
    }
    let path = config.persist()?;
    if cli.format == OutputFormat::Text {
        ui.success(&format!("Saved CLI config to {}", path.display()));
    }
    Ok(())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn ms(duration_ms: f64) -> String {
    format_duration(std::time::Duration::from_secs_f64(duration_ms.max(0.0) / 1_000.0))
}

fn print_migration_text(ui: &Ui, report: &MigrationReport) {
    ui.section(
        "Migration",
        [
            ("backend", report.backend.clone()),
            ("source", report.source.clone()),
            ("started", report.started_at.clone()),
            ("records", report.total_records.to_string()),
            ("routed", report.routed().to_string()),
            ("skipped", report.skipped_records.to_string()),
            ("buckets", report.buckets.len().to_string()),
            ("committed ops", report.committed_ops.to_string()),
            ("batches", report.committed_batches.to_string()),
            ("duration", ms(report.duration_ms)),
        ],
    );
    ui.list(
        "Buckets",
        report.buckets.iter().map(|bucket| {
            let target = bucket.target.as_deref().unwrap_or("<invalid target>");
            let mut line = format!(
                "{} -> {target}: {}/{} written in {}/{} batches",
                bucket.key, bucket.written, bucket.expected, bucket.batches, bucket.planned_batches
            );
            if let Some(v) = &bucket.validation {
                match (&v.error, v.found) {
                    (Some(err), _) => line.push_str(&format!(", validation failed: {err}")),
                    (None, Some(found)) if v.matches() => {
                        line.push_str(&format!(", validated {found}"))
                    }
                    (None, found) => line.push_str(&format!(
                        ", MISMATCH found {}",
                        found.unwrap_or_default()
                    )),
                }
            }
            if let Some(err) = &bucket.error {
                line.push_str(&format!(", error: {err}"));
            }
            line
        }),
    );
    if !report.skipped_ids.is_empty() {
        ui.list(
            "Skipped (no usable group key)",
            report.skipped_ids.iter().take(20).cloned().chain(
                (report.skipped_ids.len() > 20)
                    .then(|| format!("... and {} more", report.skipped_ids.len() - 20)),
            ),
        );
    }
    ui.spacer();
    if report.dry_run {
        ui.info("Dry run: nothing was written");
    } else if report.is_clean() {
        ui.success(&format!(
            "Migration complete: {} records in {} buckets, {} skipped",
            report.routed(),
            report.buckets.len(),
            report.skipped_records
        ));
    } else {
        ui.warn(&format!(
            "Migration finished with {} failed and {} mismatched buckets",
            report.error_count(),
            report.mismatch_count()
        ));
    }
}

fn print_verify_text(ui: &Ui, report: &VerifyReport) {
    ui.section(
        "Verify",
        [
            ("backend", report.backend.clone()),
            ("source", report.source.clone()),
            ("records", report.total_records.to_string()),
            ("skipped", report.skipped_records.to_string()),
        ],
    );
    ui.list(
        "Buckets",
        report.validations.iter().map(|v| {
            let status = match (&v.error, v.found) {
                (Some(err), _) => format!("read failed: {err}"),
                (None, Some(found)) if v.matches() => format!("ok ({found})"),
                (None, found) => format!(
                    "mismatch: expected {}, found {}",
                    v.expected,
                    found.unwrap_or_default()
                ),
            };
            format!("{} -> {}: {status}", v.key, v.target)
        }),
    );
    if report.success {
        ui.success("All buckets validated");
    } else {
        ui.warn("Validation failed for at least one bucket");
    }
}

fn print_cleanup_text(ui: &Ui, report: &CleanupReport) {
    if report.already_empty {
        ui.success(&format!("'{}' is already empty", report.source));
        return;
    }
    ui.section(
        "Cleanup",
        [
            ("backend", report.backend.clone()),
            ("source", report.source.clone()),
            ("found", report.total_found.to_string()),
            ("unmigrated", report.unmigrated_records.to_string()),
            ("deleted", report.deleted.to_string()),
            ("batches", report.batches.to_string()),
            (
                "remaining",
                report
                    .remaining
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            ),
            ("duration", ms(report.duration_ms)),
        ],
    );
    ui.spacer();
    if report.dry_run {
        ui.info(&format!(
            "Dry run: {} records would be deleted",
            report.total_found
        ));
    } else if let Some(err) = &report.error {
        ui.warn(&format!("Cleanup incomplete: {err}"));
    } else if report.verified_empty {
        ui.success("Source collection deleted and verified empty");
    } else {
        ui.warn("Source collection is not empty after cleanup");
    }
}
