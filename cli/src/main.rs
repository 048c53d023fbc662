use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use selftest_core::BatteryStatus;
use selftest_db::{IngestConfig, Manifest, WritePolicy};
use selftest_parser::{
    BatchOptions, OutputFormat, ParseOptions, SourceDocument, collect_input_paths, decode_bytes,
    format_batch_report, format_run, parse_batch, parse_document,
};
use selftest_sqlite::{Migration, RunQuery, store_run};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Markdown,
    Table,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(fmt: CliOutputFormat) -> Self {
        match fmt {
            CliOutputFormat::Json => Self::Json,
            CliOutputFormat::Yaml => Self::Yaml,
            CliOutputFormat::Markdown => Self::Markdown,
            CliOutputFormat::Table => Self::Table,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliWritePolicy {
    Upsert,
    Append,
}

impl From<CliWritePolicy> for WritePolicy {
    fn from(policy: CliWritePolicy) -> Self {
        match policy {
            CliWritePolicy::Upsert => Self::Upsert,
            CliWritePolicy::Append => Self::Append,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliBatteryStatus {
    Good,
    Fair,
    Poor,
    Unknown,
}

impl From<CliBatteryStatus> for BatteryStatus {
    fn from(status: CliBatteryStatus) -> Self {
        match status {
            CliBatteryStatus::Good => Self::Good,
            CliBatteryStatus::Fair => Self::Fair,
            CliBatteryStatus::Poor => Self::Poor,
            CliBatteryStatus::Unknown => Self::Unknown,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "selftest-ingest", version)]
#[command(about = "Parse vendor hardware self-test logs and store them in SQLite")]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse one log or JSON export and print the normalized run.
    Parse(ParseArgs),
    /// Parse files and directories in parallel and store the runs.
    Ingest(IngestArgs),
    /// SQLite table lifecycle operations.
    Migrate(MigrateArgs),
    /// Show stored runs.
    Show(ShowArgs),
}

#[derive(Debug, Args)]
struct ParseArgs {
    /// Log or JSON export to parse.
    file: PathBuf,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
    /// JSON export to use as companion instead of the sibling `.json` file.
    #[arg(long)]
    companion: Option<PathBuf>,
    /// YAML ingest configuration (battery thresholds, header scan depth).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct IngestArgs {
    /// Files and/or directories to ingest.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Database file path (default: `database.path` from the config).
    #[arg(long)]
    db: Option<PathBuf>,
    /// YAML ingest configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Table prefix (default: `database.prefix` from the config).
    #[arg(long)]
    prefix: Option<String>,
    /// How runs for an already stored serial are written.
    #[arg(long)]
    policy: Option<CliWritePolicy>,
    /// Number of parallel parse jobs (default: number of CPUs).
    #[arg(long)]
    jobs: Option<usize>,
    /// Employee number recorded on every stored run.
    #[arg(long)]
    operator: Option<String>,
    /// Descend into subdirectories.
    #[arg(long)]
    recursive: bool,
    /// Checksum manifest; files unchanged since the last ingest are skipped.
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// Ingest every file even if the manifest says it is unchanged.
    #[arg(long)]
    force: bool,
    /// Write the batch report to this path.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Batch report format.
    #[arg(long, default_value = "json")]
    report_format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct MigrateArgs {
    #[command(subcommand)]
    operation: MigrateOperation,
}

#[derive(Debug, Subcommand)]
enum MigrateOperation {
    /// Create tables in the database.
    Up(DatabaseArgs),
    /// Drop tables from the database.
    Down(DatabaseArgs),
    /// Show per-table row counts.
    Status(DatabaseArgs),
    /// Delete all stored runs, keeping the tables.
    Clear(DatabaseArgs),
}

#[derive(Debug, Args)]
struct DatabaseArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Table prefix.
    #[arg(long, default_value = "")]
    prefix: String,
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[command(flatten)]
    database: DatabaseArgs,
    /// Print the latest run of this machine serial.
    #[arg(long, conflicts_with = "battery")]
    serial: Option<String>,
    /// List runs with this battery verdict.
    #[arg(long)]
    battery: Option<CliBatteryStatus>,
    /// List failed tests (of `--serial` when given).
    #[arg(long, conflicts_with = "battery")]
    failed: bool,
    /// Output format for a single run.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Parse(args) => run_parse(args),
        Command::Ingest(args) => run_ingest(args),
        Command::Migrate(args) => run_migrate(args),
        Command::Show(args) => run_show(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// parse command
// ---------------------------------------------------------------------------

fn run_parse(args: ParseArgs) -> Result<(), String> {
    let config = load_config(args.config.as_deref())?;

    let mut doc = SourceDocument::load(&args.file).map_err(|e| e.to_string())?;
    if let Some(path) = &args.companion {
        let bytes = fs::read(path)
            .map_err(|e| format!("Failed to read companion '{}': {e}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&decode_bytes(&bytes))
            .map_err(|e| format!("Invalid companion JSON '{}': {e}", path.display()))?;
        doc = doc.with_companion(value);
    }

    let run = parse_document(&doc, &parse_options(&config))
        .map_err(|e| format!("Failed to parse '{}': {e}", args.file.display()))?;
    println!("{}", format_run(&run, args.format.into())?);
    Ok(())
}

// ---------------------------------------------------------------------------
// ingest command
// ---------------------------------------------------------------------------

fn run_ingest(args: IngestArgs) -> Result<(), String> {
    // 1. Config file, then command-line overrides
    let mut config = load_config(args.config.as_deref())?;
    if let Some(prefix) = args.prefix {
        config.database.prefix = prefix;
    }
    if let Some(policy) = args.policy {
        config.database.write_policy = policy.into();
    }
    if args.jobs.is_some() {
        config.ingest.jobs = args.jobs;
    }
    if args.operator.is_some() {
        config.ingest.operator = args.operator;
    }
    if args.recursive {
        config.ingest.recursive = true;
    }
    config.validate().map_err(|e| e.to_string())?;

    let db_path = args
        .db
        .or_else(|| config.database.path.as_ref().map(PathBuf::from))
        .ok_or("no database given: pass --db or set database.path in the config")?;
    let options = batch_options(&config);

    // 2. Walk inputs
    let paths = collect_input_paths(&args.inputs, &options).map_err(|e| e.to_string())?;

    // 3. Drop files the manifest has already seen
    let mut manifest = match &args.manifest {
        Some(path) => Some(
            Manifest::load_or_new(path)
                .map_err(|e| format!("Failed to load manifest '{}': {e}", path.display()))?,
        ),
        None => None,
    };
    let (to_parse, skipped) = match &manifest {
        Some(manifest) if !args.force => split_unchanged(paths, manifest)?,
        _ => (paths, Vec::new()),
    };

    // 4. Parse in parallel
    let mut batch = parse_batch(&to_parse, &options);
    for path in &skipped {
        batch.report.record_skipped(path);
    }

    // 5. Store sequentially
    let conn = Connection::open(&db_path)
        .map_err(|e| format!("Failed to open database '{}': {e}", db_path.display()))?;
    let mut migration = Migration::new(conn, &config.database.prefix)
        .map_err(|e| format!("Failed to initialize migration: {e}"))?;
    migration.up().map_err(|e| format!("Migration up failed: {e}"))?;
    let conn = migration.into_connection();

    let policy = config.database.write_policy;
    let mut stored = 0usize;
    for ingested in &batch.runs {
        match store_run(&conn, &config.database.prefix, &ingested.run, policy) {
            Ok(report) => {
                stored += 1;
                info!(
                    path = %ingested.path.display(),
                    serial = %ingested.run.system.machine_serial,
                    replaced = report.replaced,
                    "stored"
                );
                if let Some(manifest) = manifest.as_mut() {
                    let serial = Some(ingested.run.system.machine_serial.as_str());
                    let files = std::iter::once(&ingested.path).chain(ingested.merged_with.as_ref());
                    for file in files {
                        manifest
                            .record(file, serial)
                            .map_err(|e| format!("Failed to checksum '{}': {e}", file.display()))?;
                    }
                }
            }
            Err(err) => {
                warn!(path = %ingested.path.display(), error = %err, "store rejected");
                batch.report.mark_failed(&ingested.path, &err);
            }
        }
    }

    // 6. Persist manifest and report
    if let (Some(manifest), Some(path)) = (manifest.as_mut(), args.manifest.as_ref()) {
        manifest.prune_missing();
        manifest
            .save(path)
            .map_err(|e| format!("Failed to write manifest '{}': {e}", path.display()))?;
    }
    if let Some(path) = &args.report {
        let rendered = format_batch_report(&batch.report, args.report_format.into())?;
        fs::write(path, rendered)
            .map_err(|e| format!("Failed to write report '{}': {e}", path.display()))?;
    }

    let summary = &batch.report.summary;
    println!(
        "Ingest complete: {} stored, {} failed, {} skipped (policy: {}, database: '{}').",
        stored,
        summary.failed,
        summary.skipped,
        policy.as_str(),
        db_path.display()
    );
    let failures: Vec<_> = batch
        .report
        .details
        .iter()
        .filter_map(|d| d.error.as_ref().map(|e| (&d.path, e)))
        .collect();
    if !failures.is_empty() {
        eprintln!("\nFailures:");
        for (path, err) in failures {
            eprintln!("  {path}: {err}");
        }
    }
    Ok(())
}

/// Splits `paths` into files to parse and files the manifest marks as
/// unchanged. A log and its JSON export are skipped only together.
fn split_unchanged(
    paths: Vec<PathBuf>,
    manifest: &Manifest,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>), String> {
    let mut unchanged = HashSet::new();
    for path in &paths {
        let same = manifest
            .is_unchanged(path)
            .map_err(|e| format!("Failed to checksum '{}': {e}", path.display()))?;
        if same {
            unchanged.insert(path.clone());
        }
    }
    let changed_stems: HashSet<PathBuf> = paths
        .iter()
        .filter(|p| !unchanged.contains(*p))
        .map(|p| p.with_extension(""))
        .collect();

    Ok(paths
        .into_iter()
        .partition(|p| !unchanged.contains(p) || changed_stems.contains(&p.with_extension(""))))
}

// ---------------------------------------------------------------------------
// migrate command
// ---------------------------------------------------------------------------

fn run_migrate(args: MigrateArgs) -> Result<(), String> {
    match args.operation {
        MigrateOperation::Up(a) => run_migrate_up(a),
        MigrateOperation::Down(a) => run_migrate_down(a),
        MigrateOperation::Status(a) => run_migrate_status(a),
        MigrateOperation::Clear(a) => run_migrate_clear(a),
    }
}

fn open_migration(args: &DatabaseArgs) -> Result<Migration, String> {
    let conn = Connection::open(&args.db)
        .map_err(|e| format!("Failed to open database '{}': {e}", args.db.display()))?;
    Migration::new(conn, &args.prefix).map_err(|e| format!("Failed to initialize migration: {e}"))
}

fn run_migrate_up(args: DatabaseArgs) -> Result<(), String> {
    let mut migration = open_migration(&args)?;
    migration
        .up()
        .map_err(|e| format!("Migration up failed: {e}"))?;
    println!(
        "Migration up complete. Tables created with prefix '{}' in '{}'.",
        args.prefix,
        args.db.display()
    );
    Ok(())
}

fn run_migrate_down(args: DatabaseArgs) -> Result<(), String> {
    let mut migration = open_migration(&args)?;
    migration
        .down()
        .map_err(|e| format!("Migration down failed: {e}"))?;
    println!(
        "Migration down complete. Tables with prefix '{}' dropped from '{}'.",
        args.prefix,
        args.db.display()
    );
    Ok(())
}

fn run_migrate_status(args: DatabaseArgs) -> Result<(), String> {
    let migration = open_migration(&args)?;
    let status = migration
        .status()
        .map_err(|e| format!("Failed to get migration status: {e}"))?;
    println!("Migration Status:");
    println!(
        "  Tables exist: {}",
        if status.tables_exist { "yes" } else { "no" }
    );
    for table in &status.tables {
        println!("  {}: {}", table.name, table.rows);
    }
    Ok(())
}

fn run_migrate_clear(args: DatabaseArgs) -> Result<(), String> {
    let mut migration = open_migration(&args)?;
    let removed = migration
        .clear()
        .map_err(|e| format!("Clear failed: {e}"))?;
    println!("Clear complete. {removed} rows deleted.");
    Ok(())
}

// ---------------------------------------------------------------------------
// show command
// ---------------------------------------------------------------------------

fn run_show(args: ShowArgs) -> Result<(), String> {
    let db = &args.database;
    if !db.db.exists() {
        return Err(format!("database '{}' does not exist", db.db.display()));
    }
    let conn = Connection::open(&db.db)
        .map_err(|e| format!("Failed to open database '{}': {e}", db.db.display()))?;
    let query = RunQuery::new(&conn, &db.prefix).map_err(|e| e.to_string())?;

    if args.failed {
        let failed = query
            .failed_tests(args.serial.as_deref())
            .map_err(|e| format!("Query failed: {e}"))?;
        let rendered = serde_json::to_string_pretty(&failed)
            .map_err(|e| format!("JSON serialization failed: {e}"))?;
        println!("{rendered}");
        return Ok(());
    }

    if let Some(serial) = &args.serial {
        let run = query
            .latest_by_serial(serial)
            .map_err(|e| format!("Query failed: {e}"))?
            .ok_or_else(|| format!("no run stored for serial '{serial}'"))?;
        println!("{}", format_run(&run, args.format.into())?);
        return Ok(());
    }

    let runs = match args.battery {
        Some(status) => query.runs_by_battery_status(status.into()),
        None => query.list_runs(),
    }
    .map_err(|e| format!("Query failed: {e}"))?;
    let rendered = serde_json::to_string_pretty(&runs)
        .map_err(|e| format!("JSON serialization failed: {e}"))?;
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<IngestConfig, String> {
    let Some(path) = path else {
        return Ok(IngestConfig::default());
    };
    let config = IngestConfig::load(path)
        .map_err(|e| format!("Failed to load config '{}': {e}", path.display()))?;
    config
        .validate()
        .map_err(|e| format!("Invalid config '{}': {e}", path.display()))?;
    Ok(config)
}

fn parse_options(config: &IngestConfig) -> ParseOptions {
    ParseOptions {
        header_scan_lines: config.ingest.header_scan_lines,
        battery_policy: config.battery,
        operator: config.ingest.operator.clone(),
    }
}

fn batch_options(config: &IngestConfig) -> BatchOptions {
    BatchOptions {
        jobs: config.ingest.jobs,
        parse: parse_options(config),
        pair_companions: config.ingest.pair_companions,
        extensions: config.ingest.extensions.clone(),
        recursive: config.ingest.recursive,
    }
}
