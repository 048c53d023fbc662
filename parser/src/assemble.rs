//! Run assembly.
//!
//! [`parse_document`] detects the input format, builds the matching
//! [`FormatAdapter`], and composes system identity, component records and
//! outcomes into one [`DiagnosticRun`]. Assembly is a pure function of the
//! document and options: parsing the same document twice yields equal runs.

use selftest_core::{BatteryPolicy, DiagnosticRun, SourceFormat, SystemInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::adapter::{FormatAdapter, JsonAdapter, TextAdapter};
use crate::document::SourceDocument;
use crate::error::{ParseError, Result};
use crate::system::{resolve_machine_type, resolve_serial};

/// Default number of leading lines searched for the serial header.
pub const DEFAULT_HEADER_SCAN_LINES: usize = 20;

/// Tunables for a single parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Leading lines of a text log searched for `SERIAL_NUMBER:`.
    pub header_scan_lines: usize,
    pub battery_policy: BatteryPolicy,
    /// Stamped on every run as the technician who ran it.
    pub operator: Option<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            header_scan_lines: DEFAULT_HEADER_SCAN_LINES,
            battery_policy: BatteryPolicy::default(),
            operator: None,
        }
    }
}

/// Parses one decoded document into a run.
///
/// # Errors
///
/// - [`ParseError::Empty`] when the document has no non-blank content.
/// - [`ParseError::InvalidJson`] when a JSON document does not decode.
/// - [`ParseError::Unrecognized`] when the document has neither section
///   markers nor header fields, or the JSON root is not an object.
///
/// # Examples
///
/// ```
/// use selftest_core::{BatteryStatus, SerialSource};
/// use selftest_parser::{ParseOptions, SourceDocument, parse_document};
///
/// let doc = SourceDocument::new(
///     "PF3G44S9-2025-08-07-202945.log",
///     "SERIAL_NUMBER: PF3G44S9\n\
///      +++ 20250729T105545UTC BATTERY QUICK DIAGNOSTIC 1753786545\n\
///      DESIGN_CAPACITY: 57000mWh\n\
///      FULL_CHARGE_CAPACITY: 50270mWh\n\
///      CYCLE_COUNT: 120\n\
///      --- BATTERY QUICK DIAGNOSTIC\n",
/// );
/// let run = parse_document(&doc, &ParseOptions::default()).unwrap();
/// assert_eq!(run.system.machine_serial, "PF3G44S9");
/// assert_eq!(run.system.serial_source, SerialSource::Filename);
/// assert_eq!(run.battery.unwrap().validation.status, BatteryStatus::Good);
/// ```
pub fn parse_document(doc: &SourceDocument, options: &ParseOptions) -> Result<DiagnosticRun> {
    let format = doc
        .format()
        .ok_or_else(|| ParseError::Empty(doc.file_name.clone()))?;

    let run = match format {
        SourceFormat::Text => {
            let adapter = TextAdapter::new(&doc.content, options.header_scan_lines);
            ensure_recognized(&adapter, doc)?;
            assemble(&adapter, doc, options)
        }
        SourceFormat::Json => {
            let root: Value = serde_json::from_str(doc.content.trim_start_matches('\u{feff}'))
                .map_err(|source| ParseError::InvalidJson {
                    file: doc.file_name.clone(),
                    source,
                })?;
            let adapter = JsonAdapter::new(root);
            ensure_recognized(&adapter, doc)?;
            assemble(&adapter, doc, options)
        }
    };

    info!(
        file = %doc.file_name,
        serial = %run.system.machine_serial,
        format = run.source_format.as_str(),
        tests = run.summary.total,
        "parsed diagnostic run"
    );
    Ok(run)
}

fn ensure_recognized(adapter: &dyn FormatAdapter, doc: &SourceDocument) -> Result<()> {
    if adapter.is_recognized() {
        Ok(())
    } else {
        Err(ParseError::Unrecognized(doc.file_name.clone()))
    }
}

/// Composes a run from any adapter.
pub fn assemble(
    adapter: &dyn FormatAdapter,
    doc: &SourceDocument,
    options: &ParseOptions,
) -> DiagnosticRun {
    let mut run = DiagnosticRun::new(&doc.file_name, adapter.format());
    run.operator = options
        .operator
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string);

    let header = adapter.header();
    let serial = resolve_serial(&doc.file_name, header.serial.as_deref());
    if let Some(warning) = serial.warning {
        run.warnings.push(warning);
    }

    let machine_type_model = resolve_machine_type(
        doc.companion.as_ref(),
        adapter.embedded_machine_type().as_deref(),
        adapter.vendor_code().as_deref(),
    );
    let (start, finish) = adapter.run_window();

    run.system = SystemInfo {
        machine_serial: serial.serial,
        serial_source: serial.source,
        machine_model: header.machine_model,
        machine_type_model,
        bios_version: header.bios_version,
        application_version: header.application_version,
        execution_type: header.execution_type,
        ..SystemInfo::default()
    }
    .with_window(start, finish);
    if let (Some(start), Some(finish)) = (start, finish) {
        if finish < start {
            warn!(file = %doc.file_name, %start, %finish, "run finishes before it starts");
            run.warnings.push(format!(
                "run window inverted: finish {} precedes start {}",
                finish.to_rfc3339(),
                start.to_rfc3339()
            ));
        }
    }

    run.battery = adapter.battery(&options.battery_policy);
    run.display = adapter.display();
    run.cpu = adapter.cpu();
    run.memory = adapter.memory();
    run.storage = adapter.storage();
    run.motherboard = adapter.motherboard();

    let collected = adapter.outcomes();
    run.tests = collected.tests;
    run.summary = collected.summary;
    run.warnings.extend(collected.warnings);

    debug!(
        file = %doc.file_name,
        components = ?run.present_components(),
        warnings = run.warnings.len(),
        "assembled run"
    );
    run
}
