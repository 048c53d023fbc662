//! Memory section parser.
//!
//! The text log lists one block per installed module, each opened by an
//! `ORIGIN:` line, followed by the section's own test lines. Older logs omit
//! the `ORIGIN:` lines; the modules are then recovered positionally from the
//! repeated `SIZE:` fields. The JSON export lists modules as `bank`
//! resources of the memory diagnostic.

use selftest_core::{MemoryModule, MemoryRecord};
use serde_json::{Map, Value};
use tracing::debug;

use super::{round2, size_to_gb};
use crate::field::{FieldSource, JsonProperties, NthOccurrence};
use crate::section::{JsonModule, TextSection};

const TESTS_MARKER: &str = "START TESTS";

/// Text section: `TOTAL_PHYSICAL_MEMORY` is reported in megabytes.
///
/// # Examples
///
/// ```
/// use selftest_parser::components::memory;
/// use selftest_parser::section::{SectionMarker, TextSection, to_indexed_lines};
///
/// let lines = to_indexed_lines(
///     "+++ 20250729T105630UTC MEMORY QUICK DIAGNOSTIC 1753786590\n\
///      TOTAL_PHYSICAL_MEMORY: 16384 MB\n\
///      ORIGIN: SMBIOS\n\
///      SIZE: 8192 MB\n\
///      ORIGIN: SMBIOS\n\
///      SIZE: 8192 MB\n\
///      --- MEMORY QUICK DIAGNOSTIC",
/// );
/// let section = TextSection::locate(&lines, SectionMarker::MEMORY).unwrap();
/// let record = memory::from_text(&section);
/// assert_eq!(record.total_mb, Some(16384));
/// assert_eq!(record.module_count, 2);
/// assert_eq!(record.modules[0].size_gb, Some(8.0));
/// ```
pub fn from_text(section: &TextSection<'_>) -> MemoryRecord {
    let total_mb = section.extract_numeric("TOTAL_PHYSICAL_MEMORY");
    let inventory_end = section
        .lines
        .iter()
        .position(|line| line.text.starts_with(TESTS_MARKER))
        .unwrap_or(section.lines.len());
    let inventory = section.slice(&section.lines[..inventory_end]);

    let origins: Vec<usize> = inventory
        .lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.text.starts_with("ORIGIN:"))
        .map(|(pos, _)| pos)
        .collect();

    let modules: Vec<MemoryModule> = if origins.is_empty() {
        (0..inventory.count_field("SIZE"))
            .map(|n| module(&NthOccurrence { section: inventory, n }))
            .collect()
    } else {
        origins
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let end = origins.get(i + 1).copied().unwrap_or(inventory.lines.len());
                module(&inventory.slice(&inventory.lines[start + 1..end]))
            })
            .collect()
    };

    debug!(modules = modules.len(), "parsed memory inventory");
    MemoryRecord::from_modules(total_mb, modules)
}

/// JSON module: one [`MemoryModule`] per `bank` resource.
///
/// When the diagnostic carries no `TOTAL_PHYSICAL_MEMORY` the total is the
/// sum of the module sizes.
pub fn from_json(module_entry: &JsonModule<'_>) -> MemoryRecord {
    let modules: Vec<MemoryModule> = module_entry
        .resources("bank")
        .into_iter()
        .map(|bank: &Map<String, Value>| module(&JsonProperties(Some(bank))))
        .collect();

    let total_mb = JsonProperties(module_entry.properties())
        .extract_numeric("TOTAL_PHYSICAL_MEMORY")
        .or_else(|| {
            let sizes: Vec<f64> = modules.iter().filter_map(|m| m.size_gb).collect();
            (!sizes.is_empty()).then(|| (round2(sizes.iter().sum::<f64>()) * 1024.0) as i64)
        });

    MemoryRecord::from_modules(total_mb, modules)
}

fn module(source: &impl FieldSource) -> MemoryModule {
    MemoryModule {
        module_type: source.extract("TYPE"),
        manufacturer: source.extract("MANUFACTURER"),
        part_number: source.extract("PART_NUMBER"),
        serial_number: source.extract("SERIAL_NUMBER"),
        speed: source.extract_any(&["MEMORY_CURRENT_SPEED", "SPEED"]),
        size_gb: source.extract("SIZE").as_deref().and_then(size_to_gb),
        device_locator: source.extract("DEVICE_LOCATOR"),
        bank_locator: source.extract("BANK_LOCATOR"),
    }
}
