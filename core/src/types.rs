//! Diagnostic run type definitions.
//!
//! This module defines the normalized data model produced by the parsers:
//! one [`DiagnosticRun`] per source document, owning the system identity,
//! zero-or-one record per hardware component, and the ordered list of
//! [`TestOutcome`]s. The types are designed for serialization with
//! [`serde`] and round-trip through JSON, YAML, and SQLite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::battery::{BatteryStatus, BatteryValidation};

/// Placeholder used when no machine serial can be resolved.
pub const UNKNOWN_SERIAL: &str = "Unknown";

/// Placeholder used when no machine type/model code can be resolved.
pub const UNKNOWN_MACHINE_TYPE: &str = "N/A";

/// Input format a run was parsed from.
///
/// # Examples
///
/// ```
/// use selftest_core::SourceFormat;
///
/// assert_eq!(SourceFormat::Text.as_str(), "text");
/// assert_eq!(SourceFormat::parse("json"), Some(SourceFormat::Json));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Plain-text log with `+++` / `---` section delimiters.
    #[default]
    Text,
    /// Structured JSON export.
    Json,
}

impl SourceFormat {
    /// Returns the lowercase name used in storage and output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }

    /// Parses the lowercase name produced by [`as_str`](Self::as_str).
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Which source supplied the resolved machine serial.
///
/// Variants are listed in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SerialSource {
    /// Validated alphanumeric token taken from the file name.
    Filename,
    /// Labeled serial field in the document header.
    Header,
    /// File name token that failed validation, used as a last resort.
    FilenameUnchecked,
    /// Nothing resolved; the serial is [`UNKNOWN_SERIAL`].
    #[default]
    Unknown,
}

impl SerialSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filename => "filename",
            Self::Header => "header",
            Self::FilenameUnchecked => "filename_unchecked",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "filename" => Some(Self::Filename),
            "header" => Some(Self::Header),
            "filename_unchecked" => Some(Self::FilenameUnchecked),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Machine identity and run timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Resolved machine serial (never empty).
    pub machine_serial: String,
    /// Where [`machine_serial`](Self::machine_serial) came from.
    pub serial_source: SerialSource,
    pub machine_model: Option<String>,
    /// Machine type/model code, [`UNKNOWN_MACHINE_TYPE`] when unresolved.
    pub machine_type_model: String,
    pub bios_version: Option<String>,
    pub application_version: Option<String>,
    pub execution_type: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    /// `finish_time - start_time` in whole seconds, when both resolve.
    pub elapsed_seconds: Option<i64>,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            machine_serial: UNKNOWN_SERIAL.to_string(),
            serial_source: SerialSource::Unknown,
            machine_model: None,
            machine_type_model: UNKNOWN_MACHINE_TYPE.to_string(),
            bios_version: None,
            application_version: None,
            execution_type: None,
            start_time: None,
            finish_time: None,
            elapsed_seconds: None,
        }
    }
}

impl SystemInfo {
    /// Sets both timestamps and derives [`elapsed_seconds`](Self::elapsed_seconds).
    pub fn with_window(
        mut self,
        start: Option<DateTime<Utc>>,
        finish: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_time = start;
        self.finish_time = finish;
        self.elapsed_seconds = match (start, finish) {
            (Some(s), Some(f)) => Some((f - s).num_seconds()),
            _ => None,
        };
        self
    }
}

/// Hardware component kinds a run may carry a record for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ComponentKind {
    Battery,
    Display,
    Cpu,
    Memory,
    Storage,
    Motherboard,
}

impl ComponentKind {
    /// All kinds in canonical report order.
    pub const ALL: [ComponentKind; 6] = [
        ComponentKind::Battery,
        ComponentKind::Display,
        ComponentKind::Cpu,
        ComponentKind::Memory,
        ComponentKind::Storage,
        ComponentKind::Motherboard,
    ];

    /// Uppercase keyword used by both the text section markers and the
    /// JSON module names.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Battery => "BATTERY",
            Self::Display => "DISPLAY",
            Self::Cpu => "CPU",
            Self::Memory => "MEMORY",
            Self::Storage => "STORAGE",
            Self::Motherboard => "MOTHERBOARD",
        }
    }
}

/// A typed field value exposed by [`ComponentRecord::fields`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x:.2}"),
            Self::Null => f.write_str("-"),
        }
    }
}

impl From<&Option<String>> for FieldValue {
    fn from(value: &Option<String>) -> Self {
        value.clone().map_or(Self::Null, Self::Text)
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Null, Self::Integer)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null, Self::Float)
    }
}

/// Common view over every component record.
///
/// The field list is fixed per kind: every field is reported on every call,
/// with [`FieldValue::Null`] standing in for values the source lacked.
///
/// # Examples
///
/// ```
/// use selftest_core::{ComponentRecord, CpuRecord, FieldValue};
///
/// let cpu = CpuRecord { cores: Some(8), ..CpuRecord::default() };
/// let fields = cpu.fields();
/// assert_eq!(fields.len(), CpuRecord::default().fields().len());
/// assert!(fields.contains(&("cores", FieldValue::Integer(8))));
/// assert!(fields.contains(&("model", FieldValue::Null)));
/// ```
pub trait ComponentRecord {
    const KIND: ComponentKind;

    fn fields(&self) -> Vec<(&'static str, FieldValue)>;
}

/// Battery snapshot with derived health metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BatteryRecord {
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub design_capacity_mwh: Option<i64>,
    pub full_charge_capacity_mwh: Option<i64>,
    pub cycle_count: Option<i64>,
    /// `full / design * 100`, defined only when both capacities are positive.
    pub health_percentage: Option<f64>,
    pub validation: BatteryValidation,
}

impl ComponentRecord for BatteryRecord {
    const KIND: ComponentKind = ComponentKind::Battery;

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("serial_number", (&self.serial_number).into()),
            ("manufacturer", (&self.manufacturer).into()),
            ("design_capacity_mwh", self.design_capacity_mwh.into()),
            ("full_charge_capacity_mwh", self.full_charge_capacity_mwh.into()),
            ("cycle_count", self.cycle_count.into()),
            ("health_percentage", self.health_percentage.into()),
            (
                "validation_status",
                FieldValue::Text(self.validation.status.as_str().to_string()),
            ),
            (
                "validation_message",
                FieldValue::Text(self.validation.message.clone()),
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DisplayRecord {
    pub name: Option<String>,
    pub model_name: Option<String>,
    pub manufacturer_id: Option<String>,
    pub edid_version: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

impl ComponentRecord for DisplayRecord {
    const KIND: ComponentKind = ComponentKind::Display;

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("name", (&self.name).into()),
            ("model_name", (&self.model_name).into()),
            ("manufacturer_id", (&self.manufacturer_id).into()),
            ("edid_version", (&self.edid_version).into()),
            ("width", self.width.into()),
            ("height", self.height.into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CpuRecord {
    pub model: Option<String>,
    pub vendor: Option<String>,
    pub cores: Option<i64>,
    pub threads: Option<i64>,
    pub current_speed: Option<String>,
    pub max_speed: Option<String>,
    pub cache_l1: Option<String>,
    pub cache_l2: Option<String>,
    pub cache_l3: Option<String>,
    pub features: Option<String>,
}

impl ComponentRecord for CpuRecord {
    const KIND: ComponentKind = ComponentKind::Cpu;

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("model", (&self.model).into()),
            ("vendor", (&self.vendor).into()),
            ("cores", self.cores.into()),
            ("threads", self.threads.into()),
            ("current_speed", (&self.current_speed).into()),
            ("max_speed", (&self.max_speed).into()),
            ("cache_l1", (&self.cache_l1).into()),
            ("cache_l2", (&self.cache_l2).into()),
            ("cache_l3", (&self.cache_l3).into()),
            ("features", (&self.features).into()),
        ]
    }
}

/// One installed memory module (SMBIOS bank).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemoryModule {
    pub module_type: Option<String>,
    pub manufacturer: Option<String>,
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub speed: Option<String>,
    pub size_gb: Option<f64>,
    pub device_locator: Option<String>,
    pub bank_locator: Option<String>,
}

/// Memory snapshot: total plus per-module detail.
///
/// The flat [`fields`](ComponentRecord::fields) view summarizes the first
/// module, matching the one-row-per-run layout of the memory table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MemoryRecord {
    pub total_mb: Option<i64>,
    pub module_count: i64,
    pub modules: Vec<MemoryModule>,
}

impl MemoryRecord {
    /// Builds a record from its modules, keeping `module_count` in sync.
    pub fn from_modules(total_mb: Option<i64>, modules: Vec<MemoryModule>) -> Self {
        Self {
            total_mb,
            module_count: modules.len() as i64,
            modules,
        }
    }

    /// Total memory in whole gigabytes.
    pub fn total_gb(&self) -> Option<i64> {
        self.total_mb.map(|mb| (mb as f64 / 1024.0).round() as i64)
    }
}

impl ComponentRecord for MemoryRecord {
    const KIND: ComponentKind = ComponentKind::Memory;

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        let first = self.modules.first().cloned().unwrap_or_default();
        vec![
            ("total_mb", self.total_mb.into()),
            ("module_count", FieldValue::Integer(self.module_count)),
            ("module_type", (&first.module_type).into()),
            ("module_manufacturer", (&first.manufacturer).into()),
            ("module_part_number", (&first.part_number).into()),
            ("module_speed", (&first.speed).into()),
            ("module_size_gb", first.size_gb.into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StorageRecord {
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    /// Interface/protocol, e.g. `NVMe`.
    pub device_type: Option<String>,
    pub firmware: Option<String>,
    pub temperature_c: Option<i64>,
    pub size_gb: Option<f64>,
    /// Vendor-reported size string, kept verbatim.
    pub information_size: Option<String>,
}

impl ComponentRecord for StorageRecord {
    const KIND: ComponentKind = ComponentKind::Storage;

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("model", (&self.model).into()),
            ("serial_number", (&self.serial_number).into()),
            ("manufacturer", (&self.manufacturer).into()),
            ("device_type", (&self.device_type).into()),
            ("firmware", (&self.firmware).into()),
            ("temperature_c", self.temperature_c.into()),
            ("size_gb", self.size_gb.into()),
            ("information_size", (&self.information_size).into()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MotherboardRecord {
    pub usb_host_controllers: Option<i64>,
    pub pci_devices: Option<i64>,
    pub rtc_present: Option<String>,
    /// Raw `8S_CODE` value; the machine type is decoded from it.
    pub eight_s_code: Option<String>,
    pub thunderbolt_firmware: Option<String>,
}

impl ComponentRecord for MotherboardRecord {
    const KIND: ComponentKind = ComponentKind::Motherboard;

    fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        vec![
            ("usb_host_controllers", self.usb_host_controllers.into()),
            ("pci_devices", self.pci_devices.into()),
            ("rtc_present", (&self.rtc_present).into()),
            ("eight_s_code", (&self.eight_s_code).into()),
            ("thunderbolt_firmware", (&self.thunderbolt_firmware).into()),
        ]
    }
}

/// One individual diagnostic test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Section or module the test ran under, when known.
    pub component: Option<String>,
    /// Bare test name, e.g. `HEALTH_TEST`.
    pub name: String,
    /// `"{component} - {name}"`, or the bare name without a component.
    pub qualified_name: String,
    /// Raw result token (`PASSED`, `FAILED`, `SUCCESS`, `NOT_APPLICABLE`, ...).
    pub result_code: String,
    pub passed: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl TestOutcome {
    /// Creates an outcome, deriving the qualified name.
    ///
    /// # Examples
    ///
    /// ```
    /// use selftest_core::TestOutcome;
    ///
    /// let t = TestOutcome::new(Some("BATTERY"), "HEALTH_TEST", "PASSED", true);
    /// assert_eq!(t.qualified_name, "BATTERY - HEALTH_TEST");
    ///
    /// let bare = TestOutcome::new(None, "HEALTH_TEST", "FAILED", false);
    /// assert_eq!(bare.qualified_name, "HEALTH_TEST");
    /// ```
    pub fn new(component: Option<&str>, name: &str, result_code: &str, passed: bool) -> Self {
        let qualified_name = match component {
            Some(c) => format!("{c} - {name}"),
            None => name.to_string(),
        };
        Self {
            component: component.map(str::to_string),
            name: name.to_string(),
            qualified_name,
            result_code: result_code.to_string(),
            passed,
            start_time: None,
            end_time: None,
            duration_seconds: None,
        }
    }
}

/// Aggregate test counts.
///
/// `total`, `passed` and `failed` are tallies over the produced outcome
/// list; the remaining counters come from the vendor summary when present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TestSummary {
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
    pub warning: i64,
    pub canceled: i64,
    pub not_applicable: i64,
    pub final_result_code: Option<String>,
    /// Elapsed time string as reported by the tool (e.g. `"95 S"`).
    pub reported_elapsed: Option<String>,
}

impl TestSummary {
    /// Adds one outcome to the running tallies.
    pub fn record(&mut self, passed: bool) {
        self.total += 1;
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// One normalized diagnostic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRun {
    pub source_file: String,
    pub source_format: SourceFormat,
    pub system: SystemInfo,
    pub battery: Option<BatteryRecord>,
    pub display: Option<DisplayRecord>,
    pub cpu: Option<CpuRecord>,
    pub memory: Option<MemoryRecord>,
    pub storage: Option<StorageRecord>,
    pub motherboard: Option<MotherboardRecord>,
    pub tests: Vec<TestOutcome>,
    pub summary: TestSummary,
    /// Data-quality notes collected during assembly.
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Technician who ran the diagnostic, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

impl DiagnosticRun {
    /// Creates an empty run for `source_file`.
    pub fn new(source_file: &str, source_format: SourceFormat) -> Self {
        Self {
            source_file: source_file.to_string(),
            source_format,
            system: SystemInfo::default(),
            battery: None,
            display: None,
            cpu: None,
            memory: None,
            storage: None,
            motherboard: None,
            tests: Vec::new(),
            summary: TestSummary::default(),
            warnings: Vec::new(),
            operator: None,
        }
    }

    /// Run-level verdict: no failed test and a battery that is not POOR.
    ///
    /// A run without a battery record, or with an UNKNOWN verdict, is judged
    /// on its tests alone.
    pub fn all_passed(&self) -> bool {
        self.summary.failed == 0
            && self
                .battery
                .as_ref()
                .is_none_or(|b| b.validation.status != BatteryStatus::Poor)
    }

    /// Appends `outcome` and updates the summary tallies.
    pub fn push_test(&mut self, outcome: TestOutcome) {
        self.summary.record(outcome.passed);
        self.tests.push(outcome);
    }

    /// Component kinds this run carries a record for.
    pub fn present_components(&self) -> Vec<ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                ComponentKind::Battery => self.battery.is_some(),
                ComponentKind::Display => self.display.is_some(),
                ComponentKind::Cpu => self.cpu.is_some(),
                ComponentKind::Memory => self.memory.is_some(),
                ComponentKind::Storage => self.storage.is_some(),
                ComponentKind::Motherboard => self.motherboard.is_some(),
            })
            .collect()
    }

    /// Flat field view of one component, `None` when the run lacks it.
    pub fn component_fields(&self, kind: ComponentKind) -> Option<Vec<(&'static str, FieldValue)>> {
        match kind {
            ComponentKind::Battery => self.battery.as_ref().map(ComponentRecord::fields),
            ComponentKind::Display => self.display.as_ref().map(ComponentRecord::fields),
            ComponentKind::Cpu => self.cpu.as_ref().map(ComponentRecord::fields),
            ComponentKind::Memory => self.memory.as_ref().map(ComponentRecord::fields),
            ComponentKind::Storage => self.storage.as_ref().map(ComponentRecord::fields),
            ComponentKind::Motherboard => self.motherboard.as_ref().map(ComponentRecord::fields),
        }
    }
}
