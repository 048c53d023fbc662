use std::fs;
use std::path::PathBuf;

use selftest_core::{BatteryStatus, SerialSource, SourceFormat, validate_run};
use selftest_parser::{
    BatchOptions, ParseOptions, SourceDocument, collect_input_paths, parse_batch, parse_document,
};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn parse_fixture(name: &str) -> selftest_core::DiagnosticRun {
    let doc = SourceDocument::load(fixture_path(name)).expect("fixture should load");
    parse_document(&doc, &ParseOptions::default()).expect("fixture should parse")
}

#[test]
fn test_text_fixture_full_run() {
    let run = parse_fixture("PF3G44S9-2025-08-07-202945.log");

    assert_eq!(run.source_format, SourceFormat::Text);
    assert_eq!(run.system.machine_serial, "PF3G44S9");
    assert_eq!(run.system.serial_source, SerialSource::Filename);
    assert_eq!(run.system.bios_version.as_deref(), Some("R2FET55W (1.35)"));
    assert_eq!(run.system.application_version.as_deref(), Some("4.60.0"));
    assert_eq!(run.system.elapsed_seconds, Some(78));
    // The sibling export is attached as companion and supplies the type.
    assert_eq!(run.system.machine_type_model, "21K9");

    let battery = run.battery.as_ref().unwrap();
    assert_eq!(battery.design_capacity_mwh, Some(57000));
    assert_eq!(battery.full_charge_capacity_mwh, Some(50270));
    assert_eq!(battery.cycle_count, Some(120));
    assert!((battery.health_percentage.unwrap() - 88.19).abs() < 0.01);
    assert_eq!(battery.validation.status, BatteryStatus::Good);

    let display = run.display.as_ref().unwrap();
    assert_eq!((display.width, display.height), (Some(1920), Some(1200)));

    let memory = run.memory.as_ref().unwrap();
    assert_eq!(memory.total_mb, Some(16384));
    assert_eq!(memory.module_count, 2);
    assert_eq!(memory.modules[1].bank_locator.as_deref(), Some("BANK 2"));

    let storage = run.storage.as_ref().unwrap();
    assert_eq!(storage.size_gb, Some(476.94));
    assert_eq!(storage.temperature_c, Some(38));

    let board = run.motherboard.as_ref().unwrap();
    assert_eq!(board.usb_host_controllers, Some(3));
    assert_eq!(board.eight_s_code.as_deref(), Some("8SSB21K8001234"));

    assert_eq!(run.tests.len(), 7);
    assert_eq!(run.summary.total, 7);
    assert_eq!(run.summary.passed, 5);
    assert_eq!(run.summary.failed, 2);
    assert_eq!(run.summary.not_applicable, 1);
    assert_eq!(run.tests[0].qualified_name, "BATTERY - BATTERY_HEALTH_TEST");
    assert_eq!(run.tests[1].result_code, "NOT_APPLICABLE");
    assert!(run.warnings.is_empty());
    assert!(validate_run(&run).is_empty());
}

#[test]
fn test_json_fixture_full_run() {
    let run = parse_fixture("PF3G44S9-2025-08-07-202945.json");

    assert_eq!(run.source_format, SourceFormat::Json);
    assert_eq!(run.system.machine_serial, "PF3G44S9");
    assert_eq!(run.system.machine_type_model, "21K9");
    assert_eq!(run.system.elapsed_seconds, Some(78));
    assert!(run.cpu.is_none());

    let battery = run.battery.as_ref().unwrap();
    assert_eq!(battery.validation.status, BatteryStatus::Good);

    let display = run.display.as_ref().unwrap();
    assert_eq!(display.name.as_deref(), Some("CSO MNE007ZA1-1"));
    assert_eq!(display.width, Some(1920));

    let memory = run.memory.as_ref().unwrap();
    assert_eq!(memory.module_count, 2);
    assert_eq!(memory.total_mb, Some(16384));

    let storage = run.storage.as_ref().unwrap();
    assert_eq!(storage.manufacturer.as_deref(), Some("SAMSUNG"));

    let board = run.motherboard.as_ref().unwrap();
    assert_eq!(board.rtc_present.as_deref(), Some("YES"));

    assert_eq!(run.summary.total, 4);
    assert_eq!(run.summary.passed, 3);
    assert_eq!(run.summary.failed, 1);
    assert_eq!(run.summary.final_result_code.as_deref(), Some("WVC0A1B2C3-D4E5F6"));
    assert!(validate_run(&run).is_empty());
}

#[test]
fn test_utf16_fixture_decodes() {
    let run = parse_fixture("R90ABCDE-2025-08-08-101500.log");

    assert_eq!(run.system.machine_serial, "R90ABCDE");
    assert_eq!(run.system.machine_model.as_deref(), Some("ThinkPad X1 Carbon Gen 11"));
    assert_eq!(run.system.machine_type_model, "21HM");

    let battery = run.battery.as_ref().unwrap();
    assert_eq!(battery.validation.status, BatteryStatus::Poor);
    assert_eq!(
        battery.validation.message,
        "health 52.6% below 70%; cycle count 900 above 800"
    );
    assert_eq!(run.summary.failed, 1);
}

#[test]
fn test_fixture_parse_is_deterministic() {
    let first = serde_json::to_string(&parse_fixture("PF3G44S9-2025-08-07-202945.log")).unwrap();
    let second = serde_json::to_string(&parse_fixture("PF3G44S9-2025-08-07-202945.log")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_batch_over_fixture_directory() {
    let dir = tempfile::tempdir().unwrap();
    for name in [
        "PF3G44S9-2025-08-07-202945.log",
        "PF3G44S9-2025-08-07-202945.json",
        "R90ABCDE-2025-08-08-101500.log",
    ] {
        fs::copy(fixture_path(name), dir.path().join(name)).unwrap();
    }

    let options = BatchOptions::default();
    let paths = collect_input_paths(&[dir.path().to_path_buf()], &options).unwrap();
    assert_eq!(paths.len(), 3);

    let result = parse_batch(&paths, &options);
    assert_eq!(result.runs.len(), 2);
    assert_eq!(result.report.summary.successful, 2);
    assert_eq!(result.report.summary.failed, 0);

    let merged = &result.runs[0];
    assert_eq!(merged.run.system.machine_serial, "PF3G44S9");
    assert!(merged.merged_with.is_some());
    // Text outcomes are kept whole when the base side has any.
    assert_eq!(merged.run.summary.total, 7);
    assert_eq!(result.runs[1].run.system.machine_serial, "R90ABCDE");
}
