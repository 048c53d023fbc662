//! Cross-format run reconciliation.
//!
//! A single diagnostic run is often exported twice: once as the text log and
//! once as the JSON export. [`reconcile_runs`] combines the two parsed
//! [`DiagnosticRun`]s into one, using a [`MergeStrategy`] to decide which
//! side wins when both carry a value. A missing value never wins over a
//! present one.
//!
//! # Example
//!
//! ```
//! use selftest_core::*;
//!
//! let mut text = DiagnosticRun::new("PF3G44S9.log", SourceFormat::Text);
//! text.cpu = Some(CpuRecord { cores: Some(8), ..CpuRecord::default() });
//!
//! let mut json = DiagnosticRun::new("PF3G44S9.json", SourceFormat::Json);
//! json.cpu = Some(CpuRecord { model: Some("i7-1365U".into()), cores: Some(10), ..CpuRecord::default() });
//!
//! let merged = reconcile_runs(&text, &json, MergeStrategy::PreferBase);
//! let cpu = merged.cpu.unwrap();
//! assert_eq!(cpu.cores, Some(8));
//! assert_eq!(cpu.model.as_deref(), Some("i7-1365U"));
//! ```

use std::collections::HashSet;

use crate::{
    BatteryRecord, CpuRecord, DiagnosticRun, DisplayRecord, MemoryRecord, MotherboardRecord,
    SerialSource, StorageRecord, SystemInfo, TestOutcome, TestSummary, UNKNOWN_MACHINE_TYPE,
};

/// Run merge behavior.
///
/// # Examples
///
/// ```
/// use selftest_core::*;
///
/// let mut base = DiagnosticRun::new("a.log", SourceFormat::Text);
/// base.system.bios_version = Some("N3QET45W".into());
///
/// let mut overlay = DiagnosticRun::new("a.json", SourceFormat::Json);
/// overlay.system.bios_version = Some("N3QET46W".into());
///
/// let m1 = reconcile_runs(&base, &overlay, MergeStrategy::PreferBase);
/// assert_eq!(m1.system.bios_version.as_deref(), Some("N3QET45W"));
///
/// let m2 = reconcile_runs(&base, &overlay, MergeStrategy::PreferOverlay);
/// assert_eq!(m2.system.bios_version.as_deref(), Some("N3QET46W"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Keep base values when both sides have one.
    PreferBase,
    /// Keep overlay values when both sides have one.
    PreferOverlay,
    /// Overlay wins for scalar fields; test outcomes from both sides are
    /// combined and deduplicated by qualified name.
    Union,
}

/// Merges two parses of the same run.
///
/// Summary tallies are recomputed from the merged outcome list, so the
/// `passed + failed == total` invariant holds for the result.
pub fn reconcile_runs(
    base: &DiagnosticRun,
    overlay: &DiagnosticRun,
    strategy: MergeStrategy,
) -> DiagnosticRun {
    let (primary, secondary) = match strategy {
        MergeStrategy::PreferBase => (base, overlay),
        MergeStrategy::PreferOverlay | MergeStrategy::Union => (overlay, base),
    };

    let mut merged = DiagnosticRun::new(&primary.source_file, primary.source_format);
    merged.system = merge_system(&primary.system, &secondary.system);
    merged.battery = merge_battery(primary.battery.as_ref(), secondary.battery.as_ref());
    merged.display = merge_with(&primary.display, &secondary.display, merge_display);
    merged.cpu = merge_with(&primary.cpu, &secondary.cpu, merge_cpu);
    merged.memory = merge_memory(primary.memory.as_ref(), secondary.memory.as_ref());
    merged.storage = merge_with(&primary.storage, &secondary.storage, merge_storage);
    merged.motherboard = merge_with(&primary.motherboard, &secondary.motherboard, merge_motherboard);

    let tests = match strategy {
        MergeStrategy::Union => union_tests(&primary.tests, &secondary.tests),
        _ if primary.tests.is_empty() => secondary.tests.clone(),
        _ => primary.tests.clone(),
    };
    for outcome in tests {
        merged.push_test(outcome);
    }
    merge_vendor_counters(&mut merged.summary, &primary.summary, &secondary.summary);

    merged.operator = pick(&primary.operator, &secondary.operator);
    merged.warnings = primary.warnings.clone();
    for warning in &secondary.warnings {
        if !merged.warnings.contains(warning) {
            merged.warnings.push(warning.clone());
        }
    }

    merged
}

fn pick<T: Clone>(primary: &Option<T>, secondary: &Option<T>) -> Option<T> {
    primary.clone().or_else(|| secondary.clone())
}

fn merge_with<T: Clone>(
    primary: &Option<T>,
    secondary: &Option<T>,
    fill: impl Fn(&T, &T) -> T,
) -> Option<T> {
    match (primary, secondary) {
        (Some(p), Some(s)) => Some(fill(p, s)),
        _ => pick(primary, secondary),
    }
}

fn serial_rank(source: SerialSource) -> u8 {
    match source {
        SerialSource::Filename => 0,
        SerialSource::Header => 1,
        SerialSource::FilenameUnchecked => 2,
        SerialSource::Unknown => 3,
    }
}

fn merge_system(primary: &SystemInfo, secondary: &SystemInfo) -> SystemInfo {
    let serial_side = if serial_rank(secondary.serial_source) < serial_rank(primary.serial_source) {
        secondary
    } else {
        primary
    };
    let machine_type_model = if primary.machine_type_model == UNKNOWN_MACHINE_TYPE {
        secondary.machine_type_model.clone()
    } else {
        primary.machine_type_model.clone()
    };

    SystemInfo {
        machine_serial: serial_side.machine_serial.clone(),
        serial_source: serial_side.serial_source,
        machine_model: pick(&primary.machine_model, &secondary.machine_model),
        machine_type_model,
        bios_version: pick(&primary.bios_version, &secondary.bios_version),
        application_version: pick(&primary.application_version, &secondary.application_version),
        execution_type: pick(&primary.execution_type, &secondary.execution_type),
        ..SystemInfo::default()
    }
    .with_window(
        primary.start_time.or(secondary.start_time),
        primary.finish_time.or(secondary.finish_time),
    )
}

/// Health and verdict travel with the capacities they were computed from,
/// so the side with a health figure supplies the whole record.
fn merge_battery(
    primary: Option<&BatteryRecord>,
    secondary: Option<&BatteryRecord>,
) -> Option<BatteryRecord> {
    let (winner, other) = match (primary, secondary) {
        (Some(p), Some(s)) if p.health_percentage.is_none() && s.health_percentage.is_some() => {
            (s, Some(p))
        }
        (Some(p), s) => (p, s),
        (None, Some(s)) => (s, None),
        (None, None) => return None,
    };
    let mut merged = winner.clone();
    if let Some(other) = other {
        merged.serial_number = pick(&merged.serial_number, &other.serial_number);
        merged.manufacturer = pick(&merged.manufacturer, &other.manufacturer);
    }
    Some(merged)
}

fn merge_display(p: &DisplayRecord, s: &DisplayRecord) -> DisplayRecord {
    DisplayRecord {
        name: pick(&p.name, &s.name),
        model_name: pick(&p.model_name, &s.model_name),
        manufacturer_id: pick(&p.manufacturer_id, &s.manufacturer_id),
        edid_version: pick(&p.edid_version, &s.edid_version),
        width: p.width.or(s.width),
        height: p.height.or(s.height),
    }
}

fn merge_cpu(p: &CpuRecord, s: &CpuRecord) -> CpuRecord {
    CpuRecord {
        model: pick(&p.model, &s.model),
        vendor: pick(&p.vendor, &s.vendor),
        cores: p.cores.or(s.cores),
        threads: p.threads.or(s.threads),
        current_speed: pick(&p.current_speed, &s.current_speed),
        max_speed: pick(&p.max_speed, &s.max_speed),
        cache_l1: pick(&p.cache_l1, &s.cache_l1),
        cache_l2: pick(&p.cache_l2, &s.cache_l2),
        cache_l3: pick(&p.cache_l3, &s.cache_l3),
        features: pick(&p.features, &s.features),
    }
}

fn merge_memory(
    primary: Option<&MemoryRecord>,
    secondary: Option<&MemoryRecord>,
) -> Option<MemoryRecord> {
    match (primary, secondary) {
        (Some(p), Some(s)) => {
            let modules = if p.modules.is_empty() {
                s.modules.clone()
            } else {
                p.modules.clone()
            };
            Some(MemoryRecord::from_modules(p.total_mb.or(s.total_mb), modules))
        }
        (p, s) => p.or(s).cloned(),
    }
}

fn merge_storage(p: &StorageRecord, s: &StorageRecord) -> StorageRecord {
    StorageRecord {
        model: pick(&p.model, &s.model),
        serial_number: pick(&p.serial_number, &s.serial_number),
        manufacturer: pick(&p.manufacturer, &s.manufacturer),
        device_type: pick(&p.device_type, &s.device_type),
        firmware: pick(&p.firmware, &s.firmware),
        temperature_c: p.temperature_c.or(s.temperature_c),
        size_gb: p.size_gb.or(s.size_gb),
        information_size: pick(&p.information_size, &s.information_size),
    }
}

fn merge_motherboard(p: &MotherboardRecord, s: &MotherboardRecord) -> MotherboardRecord {
    MotherboardRecord {
        usb_host_controllers: p.usb_host_controllers.or(s.usb_host_controllers),
        pci_devices: p.pci_devices.or(s.pci_devices),
        rtc_present: pick(&p.rtc_present, &s.rtc_present),
        eight_s_code: pick(&p.eight_s_code, &s.eight_s_code),
        thunderbolt_firmware: pick(&p.thunderbolt_firmware, &s.thunderbolt_firmware),
    }
}

fn union_tests(primary: &[TestOutcome], secondary: &[TestOutcome]) -> Vec<TestOutcome> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(primary.len() + secondary.len());
    for outcome in primary.iter().chain(secondary) {
        if seen.insert(outcome.qualified_name.as_str()) {
            out.push(outcome.clone());
        }
    }
    out
}

fn merge_vendor_counters(merged: &mut TestSummary, primary: &TestSummary, secondary: &TestSummary) {
    let prefer = |p: i64, s: i64| if p != 0 { p } else { s };
    merged.warning = prefer(primary.warning, secondary.warning);
    merged.canceled = prefer(primary.canceled, secondary.canceled);
    merged.not_applicable = prefer(primary.not_applicable, secondary.not_applicable);
    merged.final_result_code = pick(&primary.final_result_code, &secondary.final_result_code);
    merged.reported_elapsed = pick(&primary.reported_elapsed, &secondary.reported_elapsed);
}
