//! Source document loading and format detection.
//!
//! Diagnostic logs are frequently written as UTF-16 by the vendor tool, while
//! the JSON exports are UTF-8. [`decode_bytes`] handles both: a UTF-16 byte
//! order mark (or a NUL-heavy byte stream) selects UTF-16, anything else is
//! decoded as UTF-8 with invalid sequences replaced.
//!
//! A text log may have a sibling JSON export with the same stem; when present
//! it is attached as the document's companion and used to enrich the machine
//! type.

use std::fs;
use std::path::{Path, PathBuf};

use selftest_core::SourceFormat;
use serde_json::Value;
use tracing::debug;

use crate::error::{ParseError, Result};

/// A decoded input document plus the context the parser needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Base file name; the machine serial is derived from it.
    pub file_name: String,
    /// Decoded document text.
    pub content: String,
    /// Parsed sibling JSON export, if any.
    pub companion: Option<Value>,
}

impl SourceDocument {
    /// Creates a document from already decoded text.
    ///
    /// Only the base name of `file_name` is kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use selftest_parser::SourceDocument;
    ///
    /// let doc = SourceDocument::new("/var/log/PF3G44S9-2025.log", "SERIAL_NUMBER: PF3G44S9");
    /// assert_eq!(doc.file_name, "PF3G44S9-2025.log");
    /// assert!(doc.companion.is_none());
    /// ```
    pub fn new(file_name: &str, content: impl Into<String>) -> Self {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);
        Self {
            file_name: base.to_string(),
            content: content.into(),
            companion: None,
        }
    }

    /// Attaches a companion JSON export.
    pub fn with_companion(mut self, companion: Value) -> Self {
        self.companion = Some(companion);
        self
    }

    /// Reads and decodes `path`, attaching the sibling `.json` companion for
    /// text documents.
    ///
    /// An unreadable or malformed companion is skipped, not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ParseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let mut doc = Self::new(&file_name, decode_bytes(&bytes));

        if doc.format() == Some(SourceFormat::Text) {
            if let Some(companion_path) = companion_path(path) {
                doc.companion = load_companion(&companion_path);
            }
        }

        Ok(doc)
    }

    /// Detects the document format.
    ///
    /// Returns `None` for a document with no non-blank content. Anything whose
    /// first non-whitespace character is `{` is JSON; everything else is text.
    ///
    /// # Examples
    ///
    /// ```
    /// use selftest_core::SourceFormat;
    /// use selftest_parser::SourceDocument;
    ///
    /// assert_eq!(SourceDocument::new("a.json", "  {\"x\": 1}").format(), Some(SourceFormat::Json));
    /// assert_eq!(SourceDocument::new("a.log", "+++ BATTERY").format(), Some(SourceFormat::Text));
    /// assert_eq!(SourceDocument::new("a.log", " \n\t").format(), None);
    /// ```
    pub fn format(&self) -> Option<SourceFormat> {
        let first = self.content.trim_start_matches('\u{feff}').trim_start().chars().next()?;
        if first == '{' {
            Some(SourceFormat::Json)
        } else {
            Some(SourceFormat::Text)
        }
    }
}

/// Returns the sibling `<stem>.json` path for a non-JSON file, if it exists.
pub fn companion_path(path: &Path) -> Option<PathBuf> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        return None;
    }
    let candidate = path.with_extension("json");
    candidate.is_file().then_some(candidate)
}

fn load_companion(path: &Path) -> Option<Value> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "companion unreadable");
            return None;
        }
    };
    let text = decode_bytes(&bytes);
    match serde_json::from_str::<Value>(text.trim_start_matches('\u{feff}')) {
        Ok(value) if value.is_object() => Some(value),
        Ok(_) => {
            debug!(path = %path.display(), "companion is not a JSON object");
            None
        }
        Err(err) => {
            debug!(path = %path.display(), error = %err, "companion is not valid JSON");
            None
        }
    }
}

/// Decodes raw file bytes into text.
///
/// - `FF FE` / `FE FF` byte order marks select UTF-16 LE / BE.
/// - Without a BOM, a stream where at least a quarter of the bytes are NUL is
///   treated as UTF-16, with the endianness taken from where the NULs sit.
/// - Otherwise the bytes are decoded as UTF-8 (a UTF-8 BOM is dropped) and
///   invalid sequences become U+FFFD.
///
/// # Examples
///
/// ```
/// use selftest_parser::decode_bytes;
///
/// let utf16: Vec<u8> = [0xFF, 0xFE]
///     .into_iter()
///     .chain("OK".encode_utf16().flat_map(|u| u.to_le_bytes()))
///     .collect();
/// assert_eq!(decode_bytes(&utf16), "OK");
/// assert_eq!(decode_bytes(b"plain"), "plain");
/// ```
pub fn decode_bytes(bytes: &[u8]) -> String {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ if looks_like_utf16(bytes) => {
            let odd_nuls = bytes.iter().skip(1).step_by(2).filter(|b| **b == 0).count();
            let even_nuls = bytes.iter().step_by(2).filter(|b| **b == 0).count();
            if odd_nuls >= even_nuls {
                decode_utf16(bytes, u16::from_le_bytes)
            } else {
                decode_utf16(bytes, u16::from_be_bytes)
            }
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

fn looks_like_utf16(bytes: &[u8]) -> bool {
    if bytes.len() < 2 {
        return false;
    }
    let nuls = bytes.iter().filter(|b| **b == 0).count();
    nuls * 4 >= bytes.len()
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
