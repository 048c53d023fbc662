//! Battery section parser.

use selftest_core::{BatteryPolicy, BatteryRecord};

use crate::field::FieldSource;

/// Builds a battery record and scores it with `policy`.
///
/// The text section and the JSON module use the same field names, so one
/// function serves both formats.
///
/// # Examples
///
/// ```
/// use selftest_core::{BatteryPolicy, BatteryStatus};
/// use selftest_parser::components::battery;
/// use selftest_parser::section::{SectionMarker, TextSection, to_indexed_lines};
///
/// let lines = to_indexed_lines(
///     "+++ 20250729T105545UTC BATTERY QUICK DIAGNOSTIC 1753786545\n\
///      CYCLE_COUNT: 42\n\
///      --- BATTERY QUICK DIAGNOSTIC",
/// );
/// let section = TextSection::locate(&lines, SectionMarker::BATTERY).unwrap();
/// let record = battery::parse(&section, &BatteryPolicy::default());
/// assert_eq!(record.cycle_count, Some(42));
/// assert_eq!(record.health_percentage, None);
/// assert_eq!(record.validation.status, BatteryStatus::Unknown);
/// ```
pub fn parse(source: &impl FieldSource, policy: &BatteryPolicy) -> BatteryRecord {
    let design = source.extract_numeric("DESIGN_CAPACITY");
    let full = source.extract_numeric("FULL_CHARGE_CAPACITY");
    let cycles = source.extract_numeric("CYCLE_COUNT");
    let (health_percentage, validation) = policy.evaluate(design, full, cycles);

    BatteryRecord {
        serial_number: source.extract("SERIAL_NUMBER"),
        manufacturer: source.extract("MANUFACTURER"),
        design_capacity_mwh: design,
        full_charge_capacity_mwh: full,
        cycle_count: cycles,
        health_percentage,
        validation,
    }
}
