use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const FIXTURES: [&str; 3] = [
    "PF3G44S9-2025-08-07-202945.log",
    "PF3G44S9-2025-08-07-202945.json",
    "R90ABCDE-2025-08-08-101500.log",
];

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../parser/tests/fixtures")
}

/// Copies the parser fixtures into `<tmp>/logs` and returns that directory.
fn stage_fixtures(tmp: &TempDir) -> PathBuf {
    let logs = tmp.path().join("logs");
    fs::create_dir_all(&logs).expect("failed to create logs dir");
    for name in FIXTURES {
        fs::copy(fixtures_dir().join(name), logs.join(name)).expect("failed to copy fixture");
    }
    logs
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_selftest-ingest"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run selftest-ingest")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn ingest(logs: &Path, db: &Path, extra: &[&str]) -> Output {
    let mut args = vec![
        "ingest",
        logs.to_str().unwrap(),
        "--db",
        db.to_str().unwrap(),
        "--prefix",
        "st_",
    ];
    args.extend_from_slice(extra);
    run(&args)
}

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

#[test]
fn parse_prints_run_as_json() {
    let log = fixtures_dir().join(FIXTURES[0]);
    let out = run(&["parse", log.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let run: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(run["system"]["machine_serial"], "PF3G44S9");
    assert_eq!(run["battery"]["validation"]["status"], "GOOD");
    assert_eq!(run["summary"]["total"], 7);
}

#[test]
fn parse_markdown_output() {
    let log = fixtures_dir().join(FIXTURES[2]);
    let out = run(&["parse", log.to_str().unwrap(), "--format", "markdown"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("R90ABCDE"));
}

#[test]
fn parse_missing_file_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.log");
    let out = run(&["parse", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("error:"));
}

#[test]
fn parse_rejects_invalid_config() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("ingest.yaml");
    fs::write(&config, "ingest:\n  header_scan_lines: 0\n").unwrap();
    let log = fixtures_dir().join(FIXTURES[0]);

    let out = run(&[
        "parse",
        log.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("header_scan_lines"));
}

// ---------------------------------------------------------------------------
// ingest and show
// ---------------------------------------------------------------------------

#[test]
fn ingest_stores_paired_runs() {
    let tmp = TempDir::new().unwrap();
    let logs = stage_fixtures(&tmp);
    let db = tmp.path().join("runs.db");
    let report = tmp.path().join("report.json");

    let out = ingest(&logs, &db, &["--jobs", "2", "--report", report.to_str().unwrap()]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("2 stored, 0 failed, 0 skipped"));

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(report["summary"]["successful"], 2);
    assert_eq!(report["summary"]["failed"], 0);

    let out = run(&["show", "--db", db.to_str().unwrap(), "--prefix", "st_"]);
    assert!(out.status.success());
    let runs: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    let serials: Vec<_> = runs
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["machine_serial"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(serials, vec!["PF3G44S9", "R90ABCDE"]);
}

#[test]
fn ingest_upsert_replaces_and_append_keeps() {
    let tmp = TempDir::new().unwrap();
    let logs = stage_fixtures(&tmp);
    let db = tmp.path().join("runs.db");
    let db_arg = db.to_str().unwrap();

    assert!(ingest(&logs, &db, &[]).status.success());
    assert!(ingest(&logs, &db, &["--policy", "upsert"]).status.success());
    let out = run(&["show", "--db", db_arg, "--prefix", "st_"]);
    let runs: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(runs.as_array().unwrap().len(), 2);

    assert!(ingest(&logs, &db, &["--policy", "append"]).status.success());
    let out = run(&["show", "--db", db_arg, "--prefix", "st_"]);
    let runs: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(runs.as_array().unwrap().len(), 4);
}

#[test]
fn ingest_manifest_skips_unchanged_files() {
    let tmp = TempDir::new().unwrap();
    let logs = stage_fixtures(&tmp);
    let db = tmp.path().join("runs.db");
    let manifest = tmp.path().join("manifest.json");
    let manifest_arg = manifest.to_str().unwrap();

    let first = ingest(&logs, &db, &["--manifest", manifest_arg]);
    assert!(first.status.success());
    assert!(manifest.exists());
    let recorded: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&manifest).unwrap()).unwrap();
    assert_eq!(recorded["files"].as_object().unwrap().len(), 3);

    let second = ingest(&logs, &db, &["--manifest", manifest_arg]);
    assert!(second.status.success());
    assert!(stdout(&second).contains("0 stored, 0 failed, 3 skipped"));

    let forced = ingest(&logs, &db, &["--manifest", manifest_arg, "--force"]);
    assert!(forced.status.success());
    assert!(stdout(&forced).contains("2 stored"));
}

#[test]
fn ingest_stamps_operator() {
    let tmp = TempDir::new().unwrap();
    let logs = stage_fixtures(&tmp);
    let db = tmp.path().join("runs.db");
    assert!(ingest(&logs, &db, &["--operator", "E1042"]).status.success());

    let out = run(&["show", "--db", db.to_str().unwrap(), "--prefix", "st_"]);
    let runs: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    for stored in runs.as_array().unwrap() {
        assert_eq!(stored["operator"], "E1042");
        assert_eq!(stored["all_passed"], false);
    }
}

#[test]
fn ingest_requires_database_path() {
    let tmp = TempDir::new().unwrap();
    let logs = stage_fixtures(&tmp);
    let out = run(&["ingest", logs.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--db"));
}

#[test]
fn ingest_uses_database_from_config() {
    let tmp = TempDir::new().unwrap();
    let logs = stage_fixtures(&tmp);
    let db = tmp.path().join("from-config.db");
    let config = tmp.path().join("ingest.yaml");
    fs::write(
        &config,
        format!(
            "database:\n  path: {}\n  prefix: cfg_\n  write_policy: append\n",
            db.display()
        ),
    )
    .unwrap();

    let out = run(&[
        "ingest",
        logs.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(stdout(&out).contains("policy: append"));

    let out = run(&["show", "--db", db.to_str().unwrap(), "--prefix", "cfg_"]);
    assert!(out.status.success());
}

#[test]
fn show_latest_run_by_serial() {
    let tmp = TempDir::new().unwrap();
    let logs = stage_fixtures(&tmp);
    let db = tmp.path().join("runs.db");
    assert!(ingest(&logs, &db, &[]).status.success());
    let db_arg = db.to_str().unwrap();

    let out = run(&["show", "--db", db_arg, "--prefix", "st_", "--serial", "R90ABCDE"]);
    assert!(out.status.success());
    let run_json: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(run_json["battery"]["validation"]["status"], "POOR");

    let out = run(&["show", "--db", db_arg, "--prefix", "st_", "--serial", "MISSING1"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("no run stored"));
}

#[test]
fn show_filters_by_battery_and_failures() {
    let tmp = TempDir::new().unwrap();
    let logs = stage_fixtures(&tmp);
    let db = tmp.path().join("runs.db");
    assert!(ingest(&logs, &db, &[]).status.success());
    let db_arg = db.to_str().unwrap();

    let out = run(&["show", "--db", db_arg, "--prefix", "st_", "--battery", "poor"]);
    let runs: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["machine_serial"], "R90ABCDE");

    let out = run(&[
        "show", "--db", db_arg, "--prefix", "st_", "--failed", "--serial", "R90ABCDE",
    ]);
    let failed: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert!(
        failed
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t["qualified_name"].as_str().unwrap().contains("BATTERY_HEALTH_TEST"))
    );
}

// ---------------------------------------------------------------------------
// migrate
// ---------------------------------------------------------------------------

#[test]
fn migrate_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("runs.db");
    let db_arg = db.to_str().unwrap();

    let out = run(&["migrate", "status", "--db", db_arg, "--prefix", "st_"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("Tables exist: no"));

    let out = run(&["migrate", "up", "--db", db_arg, "--prefix", "st_"]);
    assert!(out.status.success());

    let logs = stage_fixtures(&tmp);
    assert!(ingest(&logs, &db, &[]).status.success());

    let out = run(&["migrate", "status", "--db", db_arg, "--prefix", "st_"]);
    let text = stdout(&out);
    assert!(text.contains("Tables exist: yes"));
    assert!(text.contains("st_system_info: 2"));

    let out = run(&["migrate", "clear", "--db", db_arg, "--prefix", "st_"]);
    assert!(out.status.success());
    let out = run(&["migrate", "status", "--db", db_arg, "--prefix", "st_"]);
    assert!(stdout(&out).contains("st_system_info: 0"));

    let out = run(&["migrate", "down", "--db", db_arg, "--prefix", "st_"]);
    assert!(out.status.success());
    let out = run(&["migrate", "status", "--db", db_arg, "--prefix", "st_"]);
    assert!(stdout(&out).contains("Tables exist: no"));
}

#[test]
fn migrate_rejects_invalid_prefix() {
    let tmp = TempDir::new().unwrap();
    let db = tmp.path().join("runs.db");
    let out = run(&["migrate", "up", "--db", db.to_str().unwrap(), "--prefix", "bad;--"]);
    assert_eq!(out.status.code(), Some(1));
}
