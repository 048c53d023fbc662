//! Parsing of vendor hardware self-test reports.
//!
//! The vendor diagnostic tool writes each run twice: a plain-text log whose
//! component sections are delimited by `+++` and `---` lines, and a JSON
//! export listing the same components as modules. This crate turns either
//! form into one [`selftest_core::DiagnosticRun`].
//!
//! # Layers
//!
//! - [`section`]: locates a component's text section or JSON module.
//! - [`field`]: reads and coerces named fields inside a section.
//! - [`components`]: builds one typed record per component.
//! - [`outcomes`]: collects individual test results and tallies.
//! - [`system`]: resolves serial, machine type and run window.
//! - [`adapter`]: one [`adapter::FormatAdapter`] per input format.
//! - [`assemble`]: composes everything into a run.
//!
//! Around that core, [`document`] handles decoding and companion files,
//! [`ingest`] parses whole directories in parallel, and [`output`] renders
//! runs and [`report::BatchReport`]s.
//!
//! # Example
//!
//! ```
//! use selftest_parser::{ParseOptions, SourceDocument, parse_document};
//!
//! let log = "\
//! SERIAL_NUMBER: PF3G44S9
//! +++ 20250729T105545UTC BATTERY QUICK DIAGNOSTIC 1753786545
//! CYCLE_COUNT: 42
//! START TESTS
//! 20250729T105546UTC START HEALTH_TEST
//! 20250729T105548UTC STOP HEALTH_TEST PASSED 2 S
//! STOP TESTS
//! --- BATTERY QUICK DIAGNOSTIC
//! ";
//!
//! let doc = SourceDocument::new("PF3G44S9-2025-08-07-202945.log", log);
//! let run = parse_document(&doc, &ParseOptions::default()).unwrap();
//! assert_eq!(run.system.machine_serial, "PF3G44S9");
//! assert_eq!(run.battery.unwrap().cycle_count, Some(42));
//! assert_eq!(run.tests[0].qualified_name, "BATTERY - HEALTH_TEST");
//! ```

pub mod adapter;
pub mod assemble;
pub mod components;
pub mod document;
pub mod error;
pub mod field;
pub mod ingest;
pub mod outcomes;
pub mod output;
pub mod report;
pub mod section;
pub mod system;

pub use assemble::{DEFAULT_HEADER_SCAN_LINES, ParseOptions, parse_document};
pub use document::{SourceDocument, decode_bytes};
pub use error::{ParseError, Result};
pub use ingest::{BatchOptions, BatchResult, IngestedRun, collect_input_paths, parse_batch, parse_path};
pub use output::{OutputFormat, format_batch_report, format_run};
