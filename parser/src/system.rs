//! System identity resolution.
//!
//! The machine serial, machine type and run window each have several
//! competing sources. The rules here pick one deterministically:
//!
//! - **Serial:** a well-formed filename token (6 to 8 alphanumerics, at
//!   least one a digit), then the document header,
//!   then any filename token, then [`UNKNOWN_SERIAL`].
//! - **Machine type:** the companion export, then the document's own
//!   export field, then the decoded 8S code, then [`UNKNOWN_MACHINE_TYPE`].
//! - **Window:** timestamps in `YYYYMMDDTHHMMSS` form, with or without a
//!   trailing `UTC`.

use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use selftest_core::{SerialSource, UNKNOWN_MACHINE_TYPE, UNKNOWN_SERIAL};
use serde_json::Value;
use tracing::{debug, warn};

use crate::field::value_to_text;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";
const SERIAL_LEN: std::ops::RangeInclusive<usize> = 6..=8;

/// Outcome of serial resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSerial {
    pub serial: String,
    pub source: SerialSource,
    /// Set when the filename and header disagree.
    pub warning: Option<String>,
}

/// Leading token of the file's base name, up to the first `-`, `_`, `.`
/// or space.
///
/// # Examples
///
/// ```
/// use selftest_parser::system::filename_token;
///
/// assert_eq!(filename_token("PF3G44S9-2025-08-07-202945.log"), "PF3G44S9");
/// assert_eq!(filename_token("/data/R90ABCDE_run.json"), "R90ABCDE");
/// assert_eq!(filename_token(".log"), "");
/// ```
pub fn filename_token(file_name: &str) -> &str {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    let end = base
        .find(['-', '_', '.', ' '])
        .unwrap_or(base.len());
    &base[..end]
}

/// A serial token is 6 to 8 ASCII alphanumerics with at least one digit.
///
/// The digit rule keeps plain words such as `report` or `export` from
/// outranking the serial the document carries.
///
/// # Examples
///
/// ```
/// use selftest_parser::system::is_valid_serial_token;
///
/// assert!(is_valid_serial_token("PF3G44S9"));
/// assert!(!is_valid_serial_token("export"));
/// ```
pub fn is_valid_serial_token(token: &str) -> bool {
    SERIAL_LEN.contains(&token.len())
        && token.chars().all(|c| c.is_ascii_alphanumeric())
        && token.chars().any(|c| c.is_ascii_digit())
}

/// Picks the machine serial from the filename and header candidates.
///
/// # Examples
///
/// ```
/// use selftest_core::SerialSource;
/// use selftest_parser::system::resolve_serial;
///
/// let r = resolve_serial("PF3G44S9-2025-08-07-202945.log", Some("PF3G44S9"));
/// assert_eq!(r.serial, "PF3G44S9");
/// assert_eq!(r.source, SerialSource::Filename);
/// assert!(r.warning.is_none());
///
/// let r = resolve_serial("report.log", Some("PF3G44S9"));
/// assert_eq!(r.source, SerialSource::Header);
/// ```
pub fn resolve_serial(file_name: &str, header: Option<&str>) -> ResolvedSerial {
    let token = filename_token(file_name);
    let header = header.map(str::trim).filter(|h| !h.is_empty());

    if is_valid_serial_token(token) {
        let warning = header
            .filter(|h| !h.eq_ignore_ascii_case(token))
            .map(|h| {
                warn!(file = file_name, filename = token, header = h, "serial mismatch, using filename");
                format!("serial mismatch: filename '{token}' differs from header '{h}'")
            });
        return ResolvedSerial {
            serial: token.to_string(),
            source: SerialSource::Filename,
            warning,
        };
    }

    if let Some(h) = header {
        return ResolvedSerial {
            serial: h.to_string(),
            source: SerialSource::Header,
            warning: None,
        };
    }

    if !token.is_empty() {
        debug!(file = file_name, token, "using unvalidated filename token as serial");
        return ResolvedSerial {
            serial: token.to_string(),
            source: SerialSource::FilenameUnchecked,
            warning: None,
        };
    }

    ResolvedSerial {
        serial: UNKNOWN_SERIAL.to_string(),
        source: SerialSource::Unknown,
        warning: None,
    }
}

/// Decodes the four-character machine type from an 8S code.
///
/// Codes of six characters or fewer carry no machine type.
///
/// # Examples
///
/// ```
/// use selftest_parser::system::decode_machine_type;
///
/// assert_eq!(decode_machine_type("8SSB21K8001234").as_deref(), Some("21K8"));
/// assert_eq!(decode_machine_type("8SS21K8001234").as_deref(), Some("21K8"));
/// assert_eq!(decode_machine_type("21K8ABCDEF").as_deref(), Some("21K8"));
/// assert_eq!(decode_machine_type("8SSB21"), None);
/// ```
pub fn decode_machine_type(code: &str) -> Option<String> {
    let code = code.trim();
    if code.chars().count() <= 6 {
        return None;
    }
    let range = if code.starts_with("8SSB") {
        4..8
    } else if code.starts_with("8SS") {
        3..7
    } else {
        0..4
    };
    code.get(range).map(str::to_string)
}

/// Machine type from the first source that has one.
pub fn resolve_machine_type(
    companion: Option<&Value>,
    embedded: Option<&str>,
    vendor_code: Option<&str>,
) -> String {
    companion
        .and_then(|c| c.get("machine_type_model"))
        .and_then(value_to_text)
        .or_else(|| embedded.map(str::trim).filter(|e| !e.is_empty()).map(str::to_string))
        .or_else(|| vendor_code.and_then(decode_machine_type))
        .unwrap_or_else(|| UNKNOWN_MACHINE_TYPE.to_string())
}

/// Parses `20250729T105545` or `20250729T105545UTC` as UTC.
///
/// # Examples
///
/// ```
/// use selftest_parser::system::parse_timestamp;
///
/// let ts = parse_timestamp("20250729T105545UTC").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2025-07-29T10:55:45+00:00");
/// assert!(parse_timestamp("yesterday").is_none());
/// ```
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let value = value.strip_suffix("UTC").unwrap_or(value);
    match NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
        Ok(naive) => Some(naive.and_utc()),
        Err(err) => {
            debug!(value, error = %err, "unparseable timestamp");
            None
        }
    }
}

/// `true` when `token` has the `YYYYMMDDTHHMMSSUTC` shape.
pub fn is_timestamp_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 18
        && token.ends_with("UTC")
        && bytes[8] == b'T'
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..15].iter().all(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filename_token_boundaries() {
        assert_eq!(filename_token("PF3G44S9 copy.log"), "PF3G44S9");
        assert_eq!(filename_token("PF3G44S9.log"), "PF3G44S9");
        assert_eq!(filename_token("noseparator"), "noseparator");
    }

    #[test]
    fn test_serial_token_validation() {
        assert!(is_valid_serial_token("PF3G44S9"));
        assert!(is_valid_serial_token("R90ABC"));
        assert!(!is_valid_serial_token("R90AB"));
        assert!(!is_valid_serial_token("PF3G44S9X"));
        assert!(!is_valid_serial_token("PF3G/4S9"));
        assert!(!is_valid_serial_token("report"));
        assert!(!is_valid_serial_token("ABCDEFGH"));
    }

    #[test]
    fn test_plain_word_filename_falls_back_to_header() {
        for file in ["report.log", "export.json", "results-2025.log"] {
            let r = resolve_serial(file, Some("PF3G44S9"));
            assert_eq!(r.serial, "PF3G44S9", "{file}");
            assert_eq!(r.source, SerialSource::Header, "{file}");
            assert!(r.warning.is_none());
        }

        let r = resolve_serial("report.log", None);
        assert_eq!(r.serial, "report");
        assert_eq!(r.source, SerialSource::FilenameUnchecked);
    }

    #[test]
    fn test_serial_mismatch_prefers_filename() {
        let r = resolve_serial("PF3G44S9-2025.log", Some("R90ABCDE"));
        assert_eq!(r.serial, "PF3G44S9");
        assert_eq!(r.source, SerialSource::Filename);
        assert!(r.warning.unwrap().contains("R90ABCDE"));
    }

    #[test]
    fn test_serial_match_is_case_insensitive() {
        let r = resolve_serial("pf3g44s9-2025.log", Some("PF3G44S9"));
        assert!(r.warning.is_none());
    }

    #[test]
    fn test_serial_fallbacks() {
        let r = resolve_serial("diagnostic-report.log", None);
        assert_eq!(r.serial, "diagnostic");
        assert_eq!(r.source, SerialSource::FilenameUnchecked);

        let r = resolve_serial("-x.log", Some("  "));
        assert_eq!(r.serial, UNKNOWN_SERIAL);
        assert_eq!(r.source, SerialSource::Unknown);
    }

    #[test]
    fn test_machine_type_precedence() {
        let companion = json!({"machine_type_model": "21K9"});
        assert_eq!(
            resolve_machine_type(Some(&companion), Some("21K7"), Some("8SSB21K8001234")),
            "21K9"
        );
        assert_eq!(resolve_machine_type(None, Some("21K7"), Some("8SSB21K8001234")), "21K7");
        assert_eq!(resolve_machine_type(None, None, Some("8SSB21K8001234")), "21K8");
        assert_eq!(resolve_machine_type(None, None, Some("8SSB")), UNKNOWN_MACHINE_TYPE);
        assert_eq!(resolve_machine_type(Some(&json!({})), None, None), UNKNOWN_MACHINE_TYPE);
    }

    #[test]
    fn test_timestamp_forms() {
        assert_eq!(parse_timestamp("20250729T105545"), parse_timestamp("20250729T105545UTC"));
        assert!(is_timestamp_token("20250729T105545UTC"));
        assert!(!is_timestamp_token("20250729T105545"));
        assert!(!is_timestamp_token("BATTERY"));
    }
}
