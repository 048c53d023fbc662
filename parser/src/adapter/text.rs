use std::sync::LazyLock;

use regex::Regex;
use selftest_core::{
    BatteryPolicy, BatteryRecord, CpuRecord, DisplayRecord, MemoryRecord, MotherboardRecord,
    SourceFormat, StorageRecord,
};

use super::{FormatAdapter, HeaderFields, RunWindow};
use crate::components::{battery, cpu, display, memory, motherboard, storage};
use crate::field::FieldSource;
use crate::outcomes::{self, CollectedTests};
use crate::section::{IndexedLine, SectionMarker, TextSection, to_indexed_lines};
use crate::system::{is_timestamp_token, parse_timestamp};

static TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{8}T\d{6}UTC").expect("static regex must compile"));

const HEADER_FIELDS: [&str; 5] = [
    "SERIAL_NUMBER",
    "MACHINE_MODEL",
    "BIOS_VERSION",
    "APPLICATION_VERSION",
    "EXECUTION_TYPE",
];

/// Adapter over a `+++`/`---` delimited text log.
#[derive(Debug, Clone)]
pub struct TextAdapter {
    lines: Vec<IndexedLine>,
    header_scan_lines: usize,
}

impl TextAdapter {
    /// `header_scan_lines` bounds the search for the `SERIAL_NUMBER:` header,
    /// which component sections also use for their own serials.
    pub fn new(content: &str, header_scan_lines: usize) -> Self {
        Self {
            lines: to_indexed_lines(content),
            header_scan_lines,
        }
    }

    fn document(&self) -> TextSection<'_> {
        TextSection {
            name: &[],
            lines: &self.lines,
        }
    }

    fn section(&self, marker: SectionMarker) -> Option<TextSection<'_>> {
        TextSection::locate(&self.lines, marker)
    }
}

impl FormatAdapter for TextAdapter {
    fn format(&self) -> SourceFormat {
        SourceFormat::Text
    }

    fn is_recognized(&self) -> bool {
        let document = self.document();
        self.lines.iter().any(|line| line.text.starts_with("+++"))
            || HEADER_FIELDS.iter().any(|field| document.extract(field).is_some())
    }

    fn header(&self) -> HeaderFields {
        let document = self.document();
        // Header lines end at the first section marker.
        let scan = self
            .lines
            .iter()
            .take(self.header_scan_lines)
            .position(|line| line.text.starts_with("+++"))
            .unwrap_or_else(|| self.header_scan_lines.min(self.lines.len()));
        HeaderFields {
            serial: document.slice(&self.lines[..scan]).extract("SERIAL_NUMBER"),
            machine_model: document.extract("MACHINE_MODEL"),
            bios_version: document.extract("BIOS_VERSION"),
            application_version: document.extract("APPLICATION_VERSION"),
            execution_type: document.extract("EXECUTION_TYPE"),
        }
    }

    fn embedded_machine_type(&self) -> Option<String> {
        None
    }

    fn vendor_code(&self) -> Option<String> {
        self.section(SectionMarker::MOTHERBOARD)
            .and_then(|s| s.extract("8S_CODE"))
            .or_else(|| self.document().extract("8S_CODE"))
    }

    fn run_window(&self) -> RunWindow {
        let start = self
            .lines
            .iter()
            .filter(|line| line.text.starts_with("+++"))
            .find_map(|line| {
                line.text
                    .split_whitespace()
                    .nth(1)
                    .filter(|token| is_timestamp_token(token))
            })
            .and_then(parse_timestamp);
        let finish = self
            .lines
            .iter()
            .rev()
            .find_map(|line| TIMESTAMP.find_iter(&line.text).last())
            .and_then(|m| parse_timestamp(m.as_str()));
        (start, finish)
    }

    fn battery(&self, policy: &BatteryPolicy) -> Option<BatteryRecord> {
        self.section(SectionMarker::BATTERY)
            .map(|s| battery::parse(&s, policy))
    }

    fn display(&self) -> Option<DisplayRecord> {
        self.section(SectionMarker::DISPLAY)
            .map(|s| display::from_text(&s))
    }

    fn cpu(&self) -> Option<CpuRecord> {
        self.section(SectionMarker::CPU).map(|s| cpu::parse(&s))
    }

    fn memory(&self) -> Option<MemoryRecord> {
        self.section(SectionMarker::MEMORY)
            .map(|s| memory::from_text(&s))
    }

    fn storage(&self) -> Option<StorageRecord> {
        self.section(SectionMarker::STORAGE)
            .map(|s| storage::from_text(&s))
    }

    fn motherboard(&self) -> Option<MotherboardRecord> {
        self.section(SectionMarker::MOTHERBOARD)
            .map(|s| motherboard::from_text(&s, &self.lines))
    }

    fn outcomes(&self) -> CollectedTests {
        outcomes::collect_text(&self.lines)
    }
}
