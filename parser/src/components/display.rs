//! Display section parser.

use selftest_core::DisplayRecord;

use super::parse_resolution;
use crate::field::FieldSource;
use crate::section::JsonModule;

/// Text section: the name comes from `UDI`, resolution from `MAX_RESOLUTION`.
pub fn from_text(source: &impl FieldSource) -> DisplayRecord {
    let resolution = source
        .extract("MAX_RESOLUTION")
        .as_deref()
        .and_then(parse_resolution);
    build(source, source.extract("UDI"), resolution)
}

/// JSON module: the name is the diagnostic's `udi`, resolution from
/// `NATIVE_RESOLUTION`.
pub fn from_json(module: &JsonModule<'_>, source: &impl FieldSource) -> DisplayRecord {
    let resolution = source
        .extract_any(&["NATIVE_RESOLUTION", "MAX_RESOLUTION"])
        .as_deref()
        .and_then(parse_resolution);
    build(source, module.diagnostic_field("udi"), resolution)
}

fn build(
    source: &impl FieldSource,
    name: Option<String>,
    resolution: Option<(i64, i64)>,
) -> DisplayRecord {
    DisplayRecord {
        name,
        model_name: source.extract("MODEL_NAME"),
        manufacturer_id: source.extract("MANUFACTURER_ID"),
        edid_version: source.extract("EDID_VERSION"),
        width: resolution.map(|(w, _)| w),
        height: resolution.map(|(_, h)| h),
    }
}
