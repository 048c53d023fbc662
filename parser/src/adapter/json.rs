use selftest_core::{
    BatteryPolicy, BatteryRecord, CpuRecord, DisplayRecord, MemoryRecord, MotherboardRecord,
    SourceFormat, StorageRecord,
};
use serde_json::Value;

use super::{FormatAdapter, HeaderFields, RunWindow};
use crate::components::{battery, cpu, display, memory, motherboard, storage};
use crate::field::{JsonProperties, value_to_text};
use crate::outcomes::{self, CollectedTests};
use crate::section::{JsonModule, json_modules};
use crate::system::parse_timestamp;

/// Adapter over a decoded JSON export.
#[derive(Debug, Clone)]
pub struct JsonAdapter {
    root: Value,
}

impl JsonAdapter {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    fn module(&self, name: &str) -> Option<JsonModule<'_>> {
        JsonModule::find(json_modules(&self.root), name)
    }

    fn top_level(&self, name: &str) -> Option<String> {
        self.root.get(name).and_then(value_to_text)
    }

    fn first_iteration(&self) -> Option<&Value> {
        self.root
            .get("iterations")
            .and_then(Value::as_array)
            .and_then(|i| i.first())
    }

    fn timestamp(&self, name: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        self.top_level(name)
            .or_else(|| {
                self.first_iteration()
                    .and_then(|i| i.get(name))
                    .and_then(value_to_text)
            })
            .as_deref()
            .and_then(parse_timestamp)
    }
}

impl FormatAdapter for JsonAdapter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Json
    }

    fn is_recognized(&self) -> bool {
        self.root.is_object()
    }

    fn header(&self) -> HeaderFields {
        HeaderFields {
            serial: self.top_level("machine_serial_number"),
            machine_model: self.top_level("machine_model"),
            bios_version: self.top_level("bios_version"),
            application_version: self.top_level("application_version"),
            execution_type: self.top_level("execution_type"),
        }
    }

    fn embedded_machine_type(&self) -> Option<String> {
        self.top_level("machine_type_model")
    }

    fn vendor_code(&self) -> Option<String> {
        None
    }

    fn run_window(&self) -> RunWindow {
        (self.timestamp("start_time"), self.timestamp("finish_time"))
    }

    fn battery(&self, policy: &BatteryPolicy) -> Option<BatteryRecord> {
        self.module("BATTERY")
            .map(|m| battery::parse(&JsonProperties(m.properties()), policy))
    }

    fn display(&self) -> Option<DisplayRecord> {
        self.module("DISPLAY")
            .map(|m| display::from_json(&m, &JsonProperties(m.properties())))
    }

    fn cpu(&self) -> Option<CpuRecord> {
        self.module("CPU")
            .map(|m| cpu::parse(&JsonProperties(m.properties())))
    }

    fn memory(&self) -> Option<MemoryRecord> {
        self.module("MEMORY").map(|m| memory::from_json(&m))
    }

    fn storage(&self) -> Option<StorageRecord> {
        self.module("STORAGE")
            .map(|m| storage::from_json(&JsonProperties(m.properties())))
    }

    fn motherboard(&self) -> Option<MotherboardRecord> {
        self.module("MOTHERBOARD")
            .map(|m| motherboard::from_json(&JsonProperties(m.properties())))
    }

    fn outcomes(&self) -> CollectedTests {
        outcomes::collect_json(&self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_and_window() {
        let adapter = JsonAdapter::new(json!({
            "machine_serial_number": "PF3G44S9",
            "machine_model": "ThinkPad T14 Gen 4",
            "machine_type_model": "21K8",
            "start_time": "20250729T105545",
            "iterations": [{"finish_time": "20250729T105800", "modules": []}]
        }));
        assert!(adapter.is_recognized());
        assert_eq!(adapter.header().serial.as_deref(), Some("PF3G44S9"));
        assert_eq!(adapter.embedded_machine_type().as_deref(), Some("21K8"));
        let (start, finish) = adapter.run_window();
        assert_eq!(start, parse_timestamp("20250729T105545"));
        assert_eq!(finish, parse_timestamp("20250729T105800"));
    }

    #[test]
    fn test_missing_modules_are_absent() {
        let adapter = JsonAdapter::new(json!({"iterations": []}));
        assert!(adapter.cpu().is_none());
        assert!(adapter.memory().is_none());
        assert!(adapter.outcomes().tests.is_empty());
    }

    #[test]
    fn test_non_object_root_is_unrecognized() {
        assert!(!JsonAdapter::new(json!([1, 2])).is_recognized());
    }
}
