//! Field extraction shared by both input formats.
//!
//! Component parsers read values through [`FieldSource`], so the same
//! normalization code runs whether a value came from a `NAME: value` line of
//! a text section or from a JSON property map. Lookups never fail: a missing
//! field, an empty value, or a value that does not coerce to the requested
//! numeric type all come back as `None`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::section::TextSection;

static LEADING_DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?").expect("static regex must compile"));

/// A scope that named fields can be read from.
pub trait FieldSource {
    /// Returns the trimmed raw value of `name`, or `None`.
    fn extract(&self, name: &str) -> Option<String>;

    /// Returns the leading integer of `name`'s value.
    ///
    /// `"57000mWh (3691mAh)"` yields `57000`; `"4.000 GB"` yields `4`.
    fn extract_numeric(&self, name: &str) -> Option<i64> {
        self.extract(name).as_deref().and_then(leading_integer)
    }

    /// Returns the leading decimal number of `name`'s value.
    fn extract_decimal(&self, name: &str) -> Option<f64> {
        self.extract(name).as_deref().and_then(leading_decimal)
    }

    /// First present value among `names`.
    fn extract_any(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.extract(name))
    }
}

/// Parses the leading run of ASCII digits.
///
/// # Examples
///
/// ```
/// use selftest_parser::field::leading_integer;
///
/// assert_eq!(leading_integer("57000mWh (3691mAh)"), Some(57000));
/// assert_eq!(leading_integer(" 40 C"), Some(40));
/// assert_eq!(leading_integer("N/A"), None);
/// ```
pub fn leading_integer(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    value[..end].parse().ok()
}

/// Parses the leading decimal number.
///
/// # Examples
///
/// ```
/// use selftest_parser::field::leading_decimal;
///
/// assert_eq!(leading_decimal("4.000 GB"), Some(4.0));
/// assert_eq!(leading_decimal("16"), Some(16.0));
/// assert_eq!(leading_decimal("GB"), None);
/// ```
pub fn leading_decimal(value: &str) -> Option<f64> {
    LEADING_DECIMAL
        .find(value.trim_start())
        .and_then(|m| m.as_str().parse().ok())
}

/// Renders a scalar JSON value as text; empty strings and non-scalars are
/// treated as absent.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn line_value<'l>(line: &'l str, name: &str) -> Option<&'l str> {
    line.strip_prefix(name)?.strip_prefix(':').map(str::trim)
}

impl TextSection<'_> {
    /// Value of the `n`-th (zero-based) line beginning with `NAME:`.
    pub fn extract_nth(&self, name: &str, n: usize) -> Option<String> {
        self.lines
            .iter()
            .filter_map(|line| line_value(&line.text, name))
            .nth(n)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Number of lines beginning with `NAME:`.
    pub fn count_field(&self, name: &str) -> usize {
        self.lines
            .iter()
            .filter(|line| line_value(&line.text, name).is_some())
            .count()
    }
}

impl FieldSource for TextSection<'_> {
    /// First line that begins literally with `NAME:` (case-sensitive).
    fn extract(&self, name: &str) -> Option<String> {
        self.extract_nth(name, 0)
    }
}

/// A flat JSON object read as a field scope.
#[derive(Debug, Clone, Copy)]
pub struct JsonProperties<'a>(pub Option<&'a Map<String, Value>>);

impl FieldSource for JsonProperties<'_> {
    fn extract(&self, name: &str) -> Option<String> {
        self.0.and_then(|map| map.get(name)).and_then(value_to_text)
    }
}

/// The `n`-th occurrence of every field in a text section, used when
/// repeated sub-entries are not otherwise delimited.
#[derive(Debug, Clone, Copy)]
pub struct NthOccurrence<'a> {
    pub section: TextSection<'a>,
    pub n: usize,
}

impl FieldSource for NthOccurrence<'_> {
    fn extract(&self, name: &str) -> Option<String> {
        self.section.extract_nth(name, self.n)
    }
}
