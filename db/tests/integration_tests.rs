use std::path::Path;

use selftest_core::BatteryPolicy;
use selftest_db::{DatabaseError, IngestConfig, Manifest, WritePolicy};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_log(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[test]
fn test_config_file_drives_battery_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingest.yaml");
    std::fs::write(
        &path,
        "battery:\n  good: { min_health: 90.0, max_cycles: 300 }\n  fair: { min_health: 60.0, max_cycles: 900 }\n",
    )
    .unwrap();

    let config = IngestConfig::load(&path).unwrap();
    config.validate().unwrap();

    let (_, validation) = config.battery.evaluate(Some(57000), Some(50270), Some(120));
    assert_eq!(validation.status, selftest_core::BatteryStatus::Fair);

    let (_, default_validation) =
        BatteryPolicy::default().evaluate(Some(57000), Some(50270), Some(120));
    assert_eq!(default_validation.status, selftest_core::BatteryStatus::Good);
}

#[test]
fn test_config_rejects_unknown_policy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingest.yaml");
    std::fs::write(&path, "database:\n  write_policy: overwrite\n").unwrap();
    assert!(matches!(IngestConfig::load(&path), Err(DatabaseError::YamlError(_))));
}

#[test]
fn test_config_saved_defaults_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ingest.yaml");
    IngestConfig::default().save(&path).unwrap();

    let loaded = IngestConfig::load(&path).unwrap();
    assert_eq!(loaded.database.write_policy, WritePolicy::Upsert);
    assert_eq!(loaded.ingest.header_scan_lines, 20);
    assert_eq!(loaded, IngestConfig::default());
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

#[test]
fn test_manifest_persists_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_log(dir.path(), "PF3G44S9.log", "SERIAL_NUMBER: PF3G44S9\n");
    let second = write_log(dir.path(), "R90ABCDE.log", "SERIAL_NUMBER: R90ABCDE\n");
    let manifest_path = dir.path().join("manifest.json");

    let mut manifest = Manifest::load_or_new(&manifest_path).unwrap();
    manifest.record(&first, Some("PF3G44S9")).unwrap();
    manifest.record(&second, Some("R90ABCDE")).unwrap();
    manifest.save(&manifest_path).unwrap();

    std::fs::write(&second, "SERIAL_NUMBER: R90ABCDE\nCYCLE_COUNT: 5\n").unwrap();

    let reloaded = Manifest::load_or_new(&manifest_path).unwrap();
    assert_eq!(reloaded, manifest);
    assert!(reloaded.is_unchanged(&first).unwrap());
    assert!(!reloaded.is_unchanged(&second).unwrap());
}

#[test]
fn test_manifest_invalid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_log(dir.path(), "manifest.json", "{ nope");
    assert!(matches!(Manifest::load(&path), Err(DatabaseError::JsonError(_))));
}
