//! Format adapters.
//!
//! The assembler is written once against [`FormatAdapter`]; each input
//! format supplies the same set of answers (header fields, component
//! records, outcomes, run window) from its own structure.

mod json;
mod text;

pub use json::JsonAdapter;
pub use text::TextAdapter;

use chrono::{DateTime, Utc};
use selftest_core::{
    BatteryPolicy, BatteryRecord, CpuRecord, DisplayRecord, MemoryRecord, MotherboardRecord,
    SourceFormat, StorageRecord,
};

use crate::outcomes::CollectedTests;

/// Identity fields read from a document's header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    pub serial: Option<String>,
    pub machine_model: Option<String>,
    pub bios_version: Option<String>,
    pub application_version: Option<String>,
    pub execution_type: Option<String>,
}

/// Start and finish of a run.
pub type RunWindow = (Option<DateTime<Utc>>, Option<DateTime<Utc>>);

/// Read-only view of one decoded document in a specific input format.
///
/// Component methods return `None` when the document has no section or
/// module for that component.
pub trait FormatAdapter {
    fn format(&self) -> SourceFormat;

    /// `false` when the document carries nothing this parser understands.
    fn is_recognized(&self) -> bool;

    fn header(&self) -> HeaderFields;

    /// Machine type stated directly by the document, if any.
    fn embedded_machine_type(&self) -> Option<String>;

    /// Raw 8S code, from which the machine type can be decoded.
    fn vendor_code(&self) -> Option<String>;

    fn run_window(&self) -> RunWindow;

    fn battery(&self, policy: &BatteryPolicy) -> Option<BatteryRecord>;
    fn display(&self) -> Option<DisplayRecord>;
    fn cpu(&self) -> Option<CpuRecord>;
    fn memory(&self) -> Option<MemoryRecord>;
    fn storage(&self) -> Option<StorageRecord>;
    fn motherboard(&self) -> Option<MotherboardRecord>;

    fn outcomes(&self) -> CollectedTests;
}
