//! Test outcome collection.
//!
//! Builds the ordered outcome list of a run and keeps the summary tallies in
//! step with it, so `tests.len() == summary.total` always holds. Counters the
//! vendor reports but the outcome list cannot supply (warnings, cancels,
//! final result code) are copied from the vendor summary.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use selftest_core::{TestOutcome, TestSummary};
use serde_json::Value;
use tracing::{debug, warn};

use crate::field::{FieldSource, value_to_text};
use crate::section::{IndexedLine, SectionMarker, TextSection, json_modules};
use crate::system::{is_timestamp_token, parse_timestamp};

static START_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{8}T\d{6}UTC)\s+START\s+(\S+)").expect("static regex must compile")
});

/// `STOP NAME` anywhere on the line, optionally led by a timestamp.
static STOP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:(\d{8}T\d{6}UTC)\s+)?\bSTOP\s+(\S+)").expect("static regex must compile")
});

/// First result token after the test name, with an optional `N S` duration.
static STOP_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(PASSED|FAILED|NOT[ _]APPLICABLE)\b(?:\s+(\d+)\s*S\b)?")
        .expect("static regex must compile")
});

const TEXT_SUCCESS: &str = "PASSED";
const JSON_SUCCESS: &str = "SUCCESS";

/// Outcomes plus tallies for one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedTests {
    pub tests: Vec<TestOutcome>,
    pub summary: TestSummary,
    pub warnings: Vec<String>,
}

impl CollectedTests {
    fn push(&mut self, outcome: TestOutcome) {
        self.summary.record(outcome.passed);
        self.tests.push(outcome);
    }
}

/// Collects outcomes from a text log.
///
/// Each line containing `STOP NAME RESULT` completes one test, named after
/// the component of the most recent `+++` section line.
///
/// # Examples
///
/// ```
/// use selftest_parser::outcomes::collect_text;
/// use selftest_parser::section::to_indexed_lines;
///
/// let lines = to_indexed_lines(
///     "+++ 20250729T105545UTC BATTERY QUICK DIAGNOSTIC 1753786545\n\
///      START TESTS\n\
///      20250729T105546UTC START HEALTH_TEST\n\
///      20250729T105548UTC STOP HEALTH_TEST PASSED 2 S\n\
///      STOP TESTS\n\
///      --- BATTERY QUICK DIAGNOSTIC",
/// );
/// let collected = collect_text(&lines);
/// assert_eq!(collected.tests[0].qualified_name, "BATTERY - HEALTH_TEST");
/// assert_eq!(collected.tests[0].duration_seconds, Some(2));
/// assert_eq!(collected.summary.passed, 1);
/// ```
pub fn collect_text(lines: &[IndexedLine]) -> CollectedTests {
    let mut collected = CollectedTests::default();
    let mut current_section: Option<&str> = None;
    let mut pending: HashMap<&str, &str> = HashMap::new();

    for line in lines {
        let text = line.text.as_str();

        if text.starts_with("+++") {
            if let Some(section) = section_keyword(text) {
                current_section = Some(section);
            }
            continue;
        }

        if let Some(caps) = START_LINE.captures(text) {
            if let (Some(ts), Some(name)) = (caps.get(1), caps.get(2)) {
                pending.insert(name.as_str(), ts.as_str());
            }
            continue;
        }

        let Some(caps) = STOP_LINE.captures(text) else {
            continue;
        };
        let Some(name) = caps.get(2) else {
            continue;
        };
        let Some(result) = STOP_RESULT.captures(&text[name.end()..]) else {
            continue;
        };
        let name = name.as_str();
        let result_code = result[1].replace(' ', "_");
        let mut outcome = TestOutcome::new(
            current_section,
            name,
            &result_code,
            result_code == TEXT_SUCCESS,
        );
        outcome.start_time = pending.remove(name).and_then(parse_timestamp);
        outcome.end_time = caps.get(1).and_then(|m| parse_timestamp(m.as_str()));
        outcome.duration_seconds = result.get(2).and_then(|m| m.as_str().parse().ok());
        debug!(line = line.index, test = %outcome.qualified_name, result = %outcome.result_code, "collected test");
        collected.push(outcome);
    }

    if let Some(summary) = TextSection::locate(lines, SectionMarker::TEST_SUMMARY) {
        apply_vendor_summary(&mut collected, &summary);
    }
    collected
}

/// Component keyword of a `+++` line: the token after the timestamp, or
/// the first token when the line carries none. The test summary block is
/// not a component and leaves the current section unchanged.
fn section_keyword(line: &str) -> Option<&str> {
    let mut tokens = line.trim_start_matches('+').split_whitespace();
    let first = tokens.next()?;
    let keyword = if is_timestamp_token(first) {
        tokens.next()?
    } else {
        first
    };
    (!SectionMarker::TEST_SUMMARY.is_start(line)).then_some(keyword)
}

fn apply_vendor_summary(collected: &mut CollectedTests, source: &impl FieldSource) {
    let summary = &mut collected.summary;
    summary.warning = source.extract_numeric("WARNING_TESTS").unwrap_or(0);
    summary.canceled = source.extract_numeric("CANCELED_TESTS").unwrap_or(0);
    summary.not_applicable = source.extract_numeric("NOT_APPLICABLE_TESTS").unwrap_or(0);
    summary.final_result_code = source.extract("FINAL_RESULT_CODE");
    summary.reported_elapsed = source.extract("ELAPSED_TIME");

    if let Some(reported) = source.extract_numeric("TOTAL_TESTS") {
        if reported != summary.total {
            warn!(reported, listed = summary.total, "test summary disagrees with listed outcomes");
            collected.warnings.push(format!(
                "test summary reports {reported} tests but {} were listed",
                summary.total
            ));
        }
    }
}

/// Collects outcomes from a JSON export: every test of every diagnostic of
/// every module in the first iteration.
pub fn collect_json(root: &Value) -> CollectedTests {
    let mut collected = CollectedTests::default();

    for module in json_modules(root) {
        let module_name = module.get("name").and_then(Value::as_str);
        let diagnostics = module
            .get("diagnostics")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        for test in diagnostics
            .iter()
            .filter_map(|d| d.get("tests").and_then(Value::as_array))
            .flatten()
        {
            let Some(name) = test.get("name").and_then(value_to_text) else {
                debug!(module = module_name.unwrap_or_default(), "skipping unnamed test");
                continue;
            };
            let result_code = test.get("result").and_then(value_to_text).unwrap_or_default();
            let mut outcome = TestOutcome::new(
                module_name,
                &name,
                &result_code,
                result_code == JSON_SUCCESS,
            );
            outcome.start_time = text_field(test, "start_time").as_deref().and_then(parse_timestamp);
            outcome.end_time = text_field(test, "finish_time").as_deref().and_then(parse_timestamp);
            outcome.duration_seconds = test.get("duration").and_then(duration_seconds);
            collected.push(outcome);
        }
    }

    if let Some(iteration) = root
        .get("iterations")
        .and_then(Value::as_array)
        .and_then(|i| i.first())
    {
        collected.summary.final_result_code = text_field(iteration, "final_result_code")
            .or_else(|| text_field(iteration, "overall_status"));
    }
    collected
}

fn text_field(value: &Value, name: &str) -> Option<String> {
    value.get(name).and_then(value_to_text)
}

fn duration_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => crate::field::leading_integer(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::to_indexed_lines;
    use serde_json::json;

    const LOG: &str = "\
20250729T105540UTC STOP ORPHAN PASSED 1 S
+++ 20250729T105545UTC BATTERY QUICK DIAGNOSTIC 1753786545
START TESTS
20250729T105546UTC START HEALTH_TEST
20250729T105548UTC STOP HEALTH_TEST PASSED 2 S
20250729T105548UTC START CHARGE_TEST
20250729T105549UTC STOP CHARGE_TEST NOT APPLICABLE 1 S
STOP TESTS
--- BATTERY QUICK DIAGNOSTIC
+++ 20250729T105620UTC CPU QUICK DIAGNOSTIC 1753786580
20250729T105621UTC START STRESS_TEST
20250729T105650UTC STOP STRESS_TEST FAILED 29 S
--- CPU QUICK DIAGNOSTIC
+++ TEST SUMMARY
TOTAL_TESTS: 5
WARNING_TESTS: 1
CANCELED_TESTS: 0
NOT_APPLICABLE_TESTS: 1
FINAL_RESULT_CODE: WVC0A1B2C3-D4E5F6
ELAPSED_TIME: 70 S
--- TEST SUMMARY
";

    #[test]
    fn test_text_outcomes_and_tallies() {
        let collected = collect_text(&to_indexed_lines(LOG));
        let names: Vec<_> = collected.tests.iter().map(|t| t.qualified_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "ORPHAN",
                "BATTERY - HEALTH_TEST",
                "BATTERY - CHARGE_TEST",
                "CPU - STRESS_TEST"
            ]
        );
        assert_eq!(collected.summary.total, 4);
        assert_eq!(collected.summary.passed, 2);
        assert_eq!(collected.summary.failed, 2);
        assert_eq!(collected.tests[2].result_code, "NOT_APPLICABLE");
        assert!(!collected.tests[2].passed);
    }

    #[test]
    fn test_text_timestamps_and_duration() {
        let collected = collect_text(&to_indexed_lines(LOG));
        let health = &collected.tests[1];
        assert_eq!(health.start_time, parse_timestamp("20250729T105546UTC"));
        assert_eq!(health.end_time, parse_timestamp("20250729T105548UTC"));
        assert_eq!(health.duration_seconds, Some(2));
        assert_eq!(collected.tests[0].start_time, None);
    }

    #[test]
    fn test_text_vendor_summary() {
        let collected = collect_text(&to_indexed_lines(LOG));
        let summary = &collected.summary;
        assert_eq!(summary.warning, 1);
        assert_eq!(summary.not_applicable, 1);
        assert_eq!(summary.final_result_code.as_deref(), Some("WVC0A1B2C3-D4E5F6"));
        assert_eq!(summary.reported_elapsed.as_deref(), Some("70 S"));
        assert_eq!(collected.warnings.len(), 1);
        assert!(collected.warnings[0].contains("reports 5"));
    }

    #[test]
    fn test_untimestamped_section_line_switches_component() {
        let log = "\
+++ 20250729T105545UTC BATTERY QUICK DIAGNOSTIC 1753786545
20250729T105548UTC STOP HEALTH_TEST PASSED 2 S
--- BATTERY QUICK DIAGNOSTIC
+++ DISPLAY QUICK DIAGNOSTIC
STOP EDID_TEST PASSED
--- DISPLAY QUICK DIAGNOSTIC
+++ TEST SUMMARY
--- TEST SUMMARY
STOP LATE_TEST FAILED
";
        let collected = collect_text(&to_indexed_lines(log));
        let names: Vec<_> = collected.tests.iter().map(|t| t.qualified_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["BATTERY - HEALTH_TEST", "DISPLAY - EDID_TEST", "DISPLAY - LATE_TEST"]
        );
    }

    #[test]
    fn test_stop_marker_inside_line() {
        let log = "\
+++ 20250729T105545UTC BATTERY QUICK DIAGNOSTIC 1753786545
[INFO] 20250729T105546UTC START HEALTH_TEST
[INFO] 20250729T105548UTC STOP HEALTH_TEST PASSED 2 S
20250729T105549UTC STOP CHARGE_TEST extra detail FAILED
STOP TESTS
";
        let collected = collect_text(&to_indexed_lines(log));
        assert_eq!(collected.tests.len(), 2);

        let health = &collected.tests[0];
        assert_eq!(health.name, "HEALTH_TEST");
        assert_eq!(health.start_time, parse_timestamp("20250729T105546UTC"));
        assert_eq!(health.end_time, parse_timestamp("20250729T105548UTC"));
        assert_eq!(health.duration_seconds, Some(2));

        let charge = &collected.tests[1];
        assert_eq!(charge.name, "CHARGE_TEST");
        assert_eq!(charge.qualified_name, "BATTERY - CHARGE_TEST");
        assert_eq!(charge.result_code, "FAILED");
        assert_eq!(charge.duration_seconds, None);
    }

    #[test]
    fn test_text_without_tests() {
        let collected = collect_text(&to_indexed_lines("SERIAL_NUMBER: PF3G44S9\n"));
        assert!(collected.tests.is_empty());
        assert_eq!(collected.summary, TestSummary::default());
    }

    #[test]
    fn test_json_outcomes() {
        let root = json!({"iterations": [{
            "final_result_code": "WVC0A1B2C3",
            "modules": [
                {"name": "BATTERY", "diagnostics": [{"tests": [
                    {"name": "HEALTH_TEST", "result": "SUCCESS", "start_time": "20250729T105546",
                     "finish_time": "20250729T105548", "duration": 2},
                    {"name": "CHARGE_TEST", "result": "FAIL", "duration": "3"}
                ]}]},
                {"name": "CPU", "diagnostics": [
                    {"tests": [{"name": "STRESS_TEST", "result": "SUCCESS"}]},
                    {"tests": [{"name": "CACHE_TEST", "result": "NOT_APPLICABLE"}]}
                ]}
            ]
        }]});
        let collected = collect_json(&root);
        assert_eq!(collected.tests.len(), 4);
        assert_eq!(collected.summary.total, 4);
        assert_eq!(collected.summary.passed, 2);
        assert_eq!(collected.summary.failed, 2);
        assert_eq!(collected.tests[0].qualified_name, "BATTERY - HEALTH_TEST");
        assert_eq!(collected.tests[0].duration_seconds, Some(2));
        assert_eq!(collected.tests[1].duration_seconds, Some(3));
        assert_eq!(collected.tests[3].qualified_name, "CPU - CACHE_TEST");
        assert_eq!(collected.summary.final_result_code.as_deref(), Some("WVC0A1B2C3"));
    }

    #[test]
    fn test_json_overall_status_fallback() {
        let root = json!({"iterations": [{"overall_status": "PASSED", "modules": []}]});
        let collected = collect_json(&root);
        assert_eq!(collected.summary.final_result_code.as_deref(), Some("PASSED"));
        assert!(collected.tests.is_empty());
    }
}
