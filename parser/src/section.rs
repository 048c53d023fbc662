//! Section location for both input formats.
//!
//! Text logs delimit each component's output with a start line beginning with
//! `+++` and an end line beginning with `---`, both carrying the component
//! keyword:
//!
//! ```text
//! +++ 20250729T105545UTC BATTERY QUICK DIAGNOSTIC 1753786545
//! MANUFACTURER: SMP
//! CYCLE_COUNT: 120
//! --- BATTERY QUICK DIAGNOSTIC
//! ```
//!
//! JSON exports list components as named modules under
//! `iterations[0].modules`. In both cases a missing section is `None`, the
//! normal way of saying the component was not part of the run.

use serde_json::{Map, Value};

/// One trimmed document line with its zero-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedLine {
    pub index: usize,
    pub text: String,
}

/// Splits `content` into trimmed, indexed lines.
pub fn to_indexed_lines(content: &str) -> Vec<IndexedLine> {
    content
        .lines()
        .enumerate()
        .map(|(index, text)| IndexedLine {
            index,
            text: text.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}').to_string(),
        })
        .collect()
}

/// Returns the lines strictly between the first line matching `start` and
/// the first later line matching `end`.
///
/// Without an end line the section runs to the end of the document. Repeated
/// sections are ignored: the first start line wins.
///
/// # Examples
///
/// ```
/// use selftest_parser::section::{locate, to_indexed_lines};
///
/// let lines = to_indexed_lines("a\n[\nx\ny\n]\n[\nz\n]");
/// let body = locate(&lines, |l| l == "[", |l| l == "]").unwrap();
/// assert_eq!(body.len(), 2);
/// assert_eq!(body[0].text, "x");
///
/// assert!(locate(&lines, |l| l == "{", |l| l == "}").is_none());
/// ```
pub fn locate<'a>(
    lines: &'a [IndexedLine],
    start: impl Fn(&str) -> bool,
    end: impl Fn(&str) -> bool,
) -> Option<&'a [IndexedLine]> {
    let open = lines.iter().position(|line| start(&line.text))?;
    let body = &lines[open + 1..];
    let close = body.iter().position(|line| end(&line.text)).unwrap_or(body.len());
    Some(&body[..close])
}

/// Start/end marker pair for a text section.
///
/// A marker line must begin with the delimiter and contain every keyword as
/// a whitespace-separated token, in any position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionMarker {
    pub keywords: &'static [&'static str],
}

impl SectionMarker {
    pub const BATTERY: Self = Self::new(&["BATTERY"]);
    pub const DISPLAY: Self = Self::new(&["DISPLAY"]);
    pub const CPU: Self = Self::new(&["CPU"]);
    pub const MEMORY: Self = Self::new(&["MEMORY"]);
    pub const STORAGE: Self = Self::new(&["STORAGE"]);
    pub const MOTHERBOARD: Self = Self::new(&["MOTHERBOARD"]);
    pub const TEST_SUMMARY: Self = Self::new(&["TEST", "SUMMARY"]);

    pub const fn new(keywords: &'static [&'static str]) -> Self {
        Self { keywords }
    }

    /// Section name used for logging and test qualification.
    pub fn name(&self) -> String {
        self.keywords.join(" ")
    }

    pub fn is_start(&self, line: &str) -> bool {
        self.matches("+++", line)
    }

    pub fn is_end(&self, line: &str) -> bool {
        self.matches("---", line)
    }

    fn matches(&self, delimiter: &str, line: &str) -> bool {
        let Some(rest) = line.strip_prefix(delimiter) else {
            return false;
        };
        self.keywords
            .iter()
            .all(|keyword| rest.split_whitespace().any(|token| token == *keyword))
    }
}

/// Bounded content of one located text section.
#[derive(Debug, Clone, Copy)]
pub struct TextSection<'a> {
    pub name: &'static [&'static str],
    pub lines: &'a [IndexedLine],
}

impl<'a> TextSection<'a> {
    /// Locates the first section delimited by `marker`.
    ///
    /// # Examples
    ///
    /// ```
    /// use selftest_parser::section::{SectionMarker, TextSection, to_indexed_lines};
    ///
    /// let lines = to_indexed_lines(
    ///     "+++ 20250729T105545UTC BATTERY QUICK DIAGNOSTIC 1753786545\n\
    ///      CYCLE_COUNT: 42\n\
    ///      --- BATTERY QUICK DIAGNOSTIC\n",
    /// );
    /// let section = TextSection::locate(&lines, SectionMarker::BATTERY).unwrap();
    /// assert_eq!(section.lines.len(), 1);
    /// assert!(TextSection::locate(&lines, SectionMarker::DISPLAY).is_none());
    /// ```
    pub fn locate(lines: &'a [IndexedLine], marker: SectionMarker) -> Option<Self> {
        locate(lines, |l| marker.is_start(l), |l| marker.is_end(l)).map(|body| Self {
            name: marker.keywords,
            lines: body,
        })
    }

    /// A sub-range of this section, used for per-module blocks.
    pub fn slice(&self, lines: &'a [IndexedLine]) -> Self {
        Self {
            name: self.name,
            lines,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// One JSON module: its name and first diagnostic entry.
#[derive(Debug, Clone, Copy)]
pub struct JsonModule<'a> {
    pub name: &'a str,
    /// First entry of the module's `diagnostics` array, when there is one.
    pub diagnostic: Option<&'a Value>,
}

impl<'a> JsonModule<'a> {
    /// Finds the first module named `name` in `modules`.
    pub fn find(modules: &'a [Value], name: &str) -> Option<Self> {
        modules
            .iter()
            .find(|module| module.get("name").and_then(Value::as_str) == Some(name))
            .map(|module| Self {
                name: module.get("name").and_then(Value::as_str).unwrap_or_default(),
                diagnostic: module
                    .get("diagnostics")
                    .and_then(Value::as_array)
                    .and_then(|d| d.first()),
            })
    }

    /// Properties map of the diagnostic entry.
    pub fn properties(&self) -> Option<&'a Map<String, Value>> {
        self.diagnostic
            .and_then(|d| d.get("properties"))
            .and_then(Value::as_object)
    }

    /// A top-level field of the diagnostic entry, such as `udi`.
    pub fn diagnostic_field(&self, name: &str) -> Option<String> {
        self.diagnostic
            .and_then(|d| d.get(name))
            .and_then(crate::field::value_to_text)
    }

    /// `resources` entries named `resource`, in document order.
    pub fn resources(&self, resource: &str) -> Vec<&'a Map<String, Value>> {
        self.diagnostic
            .and_then(|d| d.get("resources"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_object)
                    .filter(|r| r.get("name").and_then(Value::as_str) == Some(resource))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Module list of the first iteration of a JSON export.
pub fn json_modules(root: &Value) -> &[Value] {
    root.get("iterations")
        .and_then(Value::as_array)
        .and_then(|iterations| iterations.first())
        .and_then(|iteration| iteration.get("modules"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
