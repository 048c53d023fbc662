//! Component parsers.
//!
//! Each submodule turns one located text section or JSON module into a
//! fixed-shape record from `selftest_core`. Reads go through
//! [`FieldSource`](crate::field::FieldSource), so the normalization rules
//! (numeric coercion, unit stripping, aggregation across repeated entries)
//! are shared by both formats wherever the field names agree.

pub mod battery;
pub mod cpu;
pub mod display;
pub mod memory;
pub mod motherboard;
pub mod storage;

use std::sync::LazyLock;

use regex::Regex;

use crate::field::leading_decimal;

static RESOLUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*[xX\u{00D7}]\s*(\d+)").expect("static regex must compile")
});

/// Parses `"1920 x 1200 pixels"` or `"1920x1200"` into width and height.
pub(crate) fn parse_resolution(value: &str) -> Option<(i64, i64)> {
    let caps = RESOLUTION.captures(value)?;
    let width = caps.get(1)?.as_str().parse().ok()?;
    let height = caps.get(2)?.as_str().parse().ok()?;
    Some((width, height))
}

/// Converts a size string to gigabytes.
///
/// Recognizes `TB`, `GB`, and `MB` suffixes; a bare number is taken as
/// megabytes, the unit the vendor log uses for module sizes.
pub(crate) fn size_to_gb(value: &str) -> Option<f64> {
    let number = leading_decimal(value)?;
    let unit = value.to_ascii_uppercase();
    let gb = if unit.contains("TB") {
        number * 1024.0
    } else if unit.contains("GB") {
        number
    } else {
        number / 1024.0
    };
    Some(round2(gb))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolution_variants() {
        assert_eq!(parse_resolution("1920 x 1200 pixels"), Some((1920, 1200)));
        assert_eq!(parse_resolution("2560x1600"), Some((2560, 1600)));
        assert_eq!(parse_resolution("unknown"), None);
    }

    #[test]
    fn test_size_to_gb_units() {
        assert_eq!(size_to_gb("4.000 GB"), Some(4.0));
        assert_eq!(size_to_gb("8192 MB"), Some(8.0));
        assert_eq!(size_to_gb("8192"), Some(8.0));
        assert_eq!(size_to_gb("1 TB"), Some(1024.0));
        assert_eq!(size_to_gb("n/a"), None);
    }
}
