//! Storage section parser.

use selftest_core::StorageRecord;

use super::{round2, size_to_gb};
use crate::field::FieldSource;

const LOGICAL_BLOCK_BYTES: f64 = 512.0;
const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Text section.
///
/// The capacity is derived from `NUMBER_LOGICAL_BLOCKS` at 512 bytes per
/// block; the vendor's own `INFORMATION_SIZE` string is kept verbatim.
pub fn from_text(source: &impl FieldSource) -> StorageRecord {
    let size_gb = source
        .extract_numeric("NUMBER_LOGICAL_BLOCKS")
        .map(|blocks| round2(blocks as f64 * LOGICAL_BLOCK_BYTES / BYTES_PER_GB));

    StorageRecord {
        model: source.extract("MODEL_NUMBER"),
        serial_number: source.extract("SERIAL_NUMBER"),
        manufacturer: source.extract("MANUFACTURER"),
        device_type: source.extract("DEVICE_TYPE"),
        firmware: source.extract("FIRMWARE_REVISION"),
        temperature_c: source.extract_numeric("TEMPERATURE"),
        size_gb,
        information_size: source.extract("INFORMATION_SIZE"),
    }
}

/// JSON module.
///
/// The export has no manufacturer property; the first word of `MODEL`
/// stands in for it.
pub fn from_json(source: &impl FieldSource) -> StorageRecord {
    let model = source.extract("MODEL");
    let manufacturer = source.extract("MANUFACTURER").or_else(|| {
        model
            .as_deref()
            .and_then(|m| m.split_whitespace().next())
            .map(str::to_string)
    });
    let size = source.extract("SIZE");

    StorageRecord {
        serial_number: source.extract("SERIAL"),
        manufacturer,
        device_type: source.extract("PROTOCOL"),
        firmware: source.extract("FIRMWARE"),
        temperature_c: source.extract_numeric("TEMPERATURE"),
        size_gb: size.as_deref().and_then(size_to_gb),
        information_size: size,
        model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::JsonProperties;
    use crate::section::{SectionMarker, TextSection, to_indexed_lines};
    use serde_json::json;

    #[test]
    fn test_text_storage() {
        let lines = to_indexed_lines(
            "+++ 20250729T105700UTC STORAGE QUICK DIAGNOSTIC 1753786620
MODEL_NUMBER: SAMSUNG MZVL2512HCJQ-00BL7
SERIAL_NUMBER: S64KNX0T123456
MANUFACTURER: Samsung
DEVICE_TYPE: NVMe
FIRMWARE_REVISION: 6L2QGXD7
TEMPERATURE: 38 C
NUMBER_LOGICAL_BLOCKS: 1000215216
INFORMATION_SIZE: 512 GB
--- STORAGE QUICK DIAGNOSTIC",
        );
        let section = TextSection::locate(&lines, SectionMarker::STORAGE).unwrap();
        let storage = from_text(&section);
        assert_eq!(storage.model.as_deref(), Some("SAMSUNG MZVL2512HCJQ-00BL7"));
        assert_eq!(storage.firmware.as_deref(), Some("6L2QGXD7"));
        assert_eq!(storage.temperature_c, Some(38));
        assert_eq!(storage.size_gb, Some(476.94));
        assert_eq!(storage.information_size.as_deref(), Some("512 GB"));
    }

    #[test]
    fn test_json_manufacturer_from_model() {
        let props = json!({
            "MODEL": "SAMSUNG MZVL2512HCJQ-00BL7",
            "SERIAL": "S64KNX0T123456",
            "PROTOCOL": "NVMe",
            "SIZE": "512.11 GB",
            "TEMPERATURE": 41
        });
        let storage = from_json(&JsonProperties(props.as_object()));
        assert_eq!(storage.manufacturer.as_deref(), Some("SAMSUNG"));
        assert_eq!(storage.serial_number.as_deref(), Some("S64KNX0T123456"));
        assert_eq!(storage.device_type.as_deref(), Some("NVMe"));
        assert_eq!(storage.temperature_c, Some(41));
        assert_eq!(storage.size_gb, Some(512.11));
        assert_eq!(storage.information_size.as_deref(), Some("512.11 GB"));
    }

    #[test]
    fn test_json_missing_model() {
        let storage = from_json(&JsonProperties(None));
        assert_eq!(storage, StorageRecord::default());
    }
}
