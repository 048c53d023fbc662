//! Motherboard section parser.
//!
//! Controller counts are not always reported directly. For text logs the
//! USB count falls back to a search of the whole document and then to the
//! number of USB device class lines; the PCI count falls back to the number
//! of `PCI_INDEX:` entries. A count of zero is treated as unknown.

use selftest_core::MotherboardRecord;

use crate::field::FieldSource;
use crate::section::{IndexedLine, TextSection};

/// Text section. `document` is the full line list, used for the USB count
/// fallback when the section itself does not report it.
pub fn from_text(section: &TextSection<'_>, document: &[IndexedLine]) -> MotherboardRecord {
    let whole = section.slice(document);
    let usb = section
        .extract_numeric("NUMBER_USB_HOST_CONTROLLERS")
        .or_else(|| whole.extract_numeric("NUMBER_USB_HOST_CONTROLLERS"))
        .or_else(|| {
            let classes = section
                .lines
                .iter()
                .filter(|line| line.text.contains("CLASS:") && line.text.contains("USB"))
                .count();
            Some(classes as i64)
        });
    let pci = section
        .extract_numeric("NUMBER_PCI")
        .or_else(|| Some(section.count_field("PCI_INDEX") as i64));

    MotherboardRecord {
        usb_host_controllers: usb.filter(|n| *n > 0),
        pci_devices: pci.filter(|n| *n > 0),
        rtc_present: section.extract("RTC_PRESENCE"),
        eight_s_code: section.extract("8S_CODE"),
        thunderbolt_firmware: section.extract("TB_FW_VERSION"),
    }
}

/// JSON module. The export carries neither the 8S code nor the
/// Thunderbolt firmware.
pub fn from_json(source: &impl FieldSource) -> MotherboardRecord {
    MotherboardRecord {
        usb_host_controllers: source
            .extract_numeric("MOTHERBOARD_USB_HOST_CONTROLLER_COUNT")
            .filter(|n| *n > 0),
        pci_devices: source
            .extract_numeric("MOTHERBOARD_PCI_DEVICE_COUNT")
            .filter(|n| *n > 0),
        rtc_present: source.extract_any(&[
            "MOTHERBOARD_REAL_TIME_CLOCK_PRESENT",
            "MOTHERBOARD_RTC_PRESENT",
        ]),
        eight_s_code: None,
        thunderbolt_firmware: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::JsonProperties;
    use crate::section::{SectionMarker, to_indexed_lines};
    use serde_json::json;

    #[test]
    fn test_text_direct_counts() {
        let lines = to_indexed_lines(
            "+++ 20250729T105720UTC MOTHERBOARD QUICK DIAGNOSTIC 1753786640
NUMBER_USB_HOST_CONTROLLERS: 3
NUMBER_PCI: 24
RTC_PRESENCE: YES
8S_CODE: 8SSB21K8001234
TB_FW_VERSION: 29.0
--- MOTHERBOARD QUICK DIAGNOSTIC",
        );
        let section = TextSection::locate(&lines, SectionMarker::MOTHERBOARD).unwrap();
        let board = from_text(&section, &lines);
        assert_eq!(board.usb_host_controllers, Some(3));
        assert_eq!(board.pci_devices, Some(24));
        assert_eq!(board.rtc_present.as_deref(), Some("YES"));
        assert_eq!(board.eight_s_code.as_deref(), Some("8SSB21K8001234"));
        assert_eq!(board.thunderbolt_firmware.as_deref(), Some("29.0"));
    }

    #[test]
    fn test_text_count_fallbacks() {
        let lines = to_indexed_lines(
            "+++ 20250729T105720UTC MOTHERBOARD QUICK DIAGNOSTIC 1753786640
PCI_INDEX: 0
CLASS: USB controller
PCI_INDEX: 1
CLASS: USB controller
PCI_INDEX: 2
CLASS: Bridge
--- MOTHERBOARD QUICK DIAGNOSTIC",
        );
        let section = TextSection::locate(&lines, SectionMarker::MOTHERBOARD).unwrap();
        let board = from_text(&section, &lines);
        assert_eq!(board.usb_host_controllers, Some(2));
        assert_eq!(board.pci_devices, Some(3));
    }

    #[test]
    fn test_text_usb_count_from_document() {
        let lines = to_indexed_lines(
            "NUMBER_USB_HOST_CONTROLLERS: 4
+++ 20250729T105720UTC MOTHERBOARD QUICK DIAGNOSTIC 1753786640
RTC_PRESENCE: YES
--- MOTHERBOARD QUICK DIAGNOSTIC",
        );
        let section = TextSection::locate(&lines, SectionMarker::MOTHERBOARD).unwrap();
        let board = from_text(&section, &lines);
        assert_eq!(board.usb_host_controllers, Some(4));
        assert_eq!(board.pci_devices, None);
    }

    #[test]
    fn test_json_rtc_key_variants() {
        let props = json!({
            "MOTHERBOARD_USB_HOST_CONTROLLER_COUNT": "2",
            "MOTHERBOARD_PCI_DEVICE_COUNT": 0,
            "MOTHERBOARD_RTC_PRESENT": "true"
        });
        let board = from_json(&JsonProperties(props.as_object()));
        assert_eq!(board.usb_host_controllers, Some(2));
        assert_eq!(board.pci_devices, None);
        assert_eq!(board.rtc_present.as_deref(), Some("true"));
        assert_eq!(board.eight_s_code, None);
    }
}
