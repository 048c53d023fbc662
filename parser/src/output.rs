//! Output formatting for runs and batch reports.

use selftest_core::{ComponentKind, DiagnosticRun};

use crate::report::BatchReport;

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Markdown,
    Table,
}

/// Formats a run in the requested output format.
pub fn format_run(run: &DiagnosticRun, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(run).map_err(|e| format!("JSON serialization failed: {e}"))
        }
        OutputFormat::Yaml => {
            serde_yaml::to_string(run).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown => Ok(run_to_markdown(run)),
        OutputFormat::Table => Ok(run_to_table(run)),
    }
}

/// Formats a batch report in the requested output format.
pub fn format_batch_report(report: &BatchReport, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Markdown => Ok(report_to_markdown(report)),
        OutputFormat::Table => Ok(report_to_table(report)),
    }
}

fn component_title(kind: ComponentKind) -> &'static str {
    match kind {
        ComponentKind::Battery => "Battery",
        ComponentKind::Display => "Display",
        ComponentKind::Cpu => "CPU",
        ComponentKind::Memory => "Memory",
        ComponentKind::Storage => "Storage",
        ComponentKind::Motherboard => "Motherboard",
    }
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn run_to_markdown(run: &DiagnosticRun) -> String {
    let mut out = String::new();
    let system = &run.system;

    out.push_str(&format!("# Diagnostic Run: {}\n\n", system.machine_serial));
    out.push_str(&format!("- **Source:** {} ({})\n", run.source_file, run.source_format.as_str()));
    out.push_str(&format!("- **Model:** {}\n", opt(&system.machine_model)));
    out.push_str(&format!("- **Machine Type:** {}\n", system.machine_type_model));
    if let Some(ref operator) = run.operator {
        out.push_str(&format!("- **Operator:** {operator}\n"));
    }
    out.push_str(&format!(
        "- **Verdict:** {}\n",
        if run.all_passed() { "all passed" } else { "attention needed" }
    ));
    out.push_str(&format!("- **BIOS:** {}\n", opt(&system.bios_version)));
    if let Some(ref start) = system.start_time {
        out.push_str(&format!("- **Started:** {}\n", start.to_rfc3339()));
    }
    if let Some(elapsed) = system.elapsed_seconds {
        out.push_str(&format!("- **Elapsed:** {elapsed} s\n"));
    }
    out.push('\n');

    for kind in run.present_components() {
        let Some(fields) = run.component_fields(kind) else {
            continue;
        };
        out.push_str(&format!("## {}\n\n", component_title(kind)));
        out.push_str("| Field | Value |\n");
        out.push_str("|-------|-------|\n");
        for (name, value) in fields {
            out.push_str(&format!("| {name} | {value} |\n"));
        }
        out.push('\n');
    }

    if !run.tests.is_empty() {
        out.push_str("## Tests\n\n");
        out.push_str("| Test | Result | Duration |\n");
        out.push_str("|------|--------|----------|\n");
        for test in &run.tests {
            let duration = test
                .duration_seconds
                .map(|d| format!("{d} s"))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "| {} | {} | {duration} |\n",
                test.qualified_name, test.result_code
            ));
        }
        out.push('\n');
    }

    let summary = &run.summary;
    out.push_str(&format!(
        "**Summary:** {} total, {} passed, {} failed",
        summary.total, summary.passed, summary.failed
    ));
    if let Some(ref code) = summary.final_result_code {
        out.push_str(&format!(" (final result {code})"));
    }
    out.push('\n');

    if !run.warnings.is_empty() {
        out.push_str("\n## Warnings\n\n");
        for w in &run.warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }

    out
}

fn run_to_table(run: &DiagnosticRun) -> String {
    let mut out = String::new();
    let system = &run.system;

    out.push_str(&format!(
        "Serial: {}  Type: {}  Format: {}",
        system.machine_serial,
        system.machine_type_model,
        run.source_format.as_str()
    ));
    if let Some(ref model) = system.machine_model {
        out.push_str(&format!("  Model: {model}"));
    }
    out.push('\n');

    for kind in run.present_components() {
        let Some(fields) = run.component_fields(kind) else {
            continue;
        };
        out.push_str(&format!("\n{}:\n", component_title(kind)));
        let width = fields.iter().map(|(name, _)| name.len()).max().unwrap_or(4);
        for (name, value) in fields.iter().filter(|(_, v)| !v.is_null()) {
            out.push_str(&format!("  {name:<width$}  {value}\n"));
        }
    }

    if !run.tests.is_empty() {
        out.push_str("\nTests:\n");
        let width = run
            .tests
            .iter()
            .map(|t| t.qualified_name.len())
            .max()
            .unwrap_or(4);
        for test in &run.tests {
            let mark = if test.passed { "OK" } else { "FAIL" };
            out.push_str(&format!(
                "  {:<width$}  {:<4}  {}\n",
                test.qualified_name, mark, test.result_code
            ));
        }
    }

    out.push_str(&format!(
        "\nTotal: {}  Passed: {}  Failed: {}\n",
        run.summary.total, run.summary.passed, run.summary.failed
    ));
    out
}

fn report_to_markdown(report: &BatchReport) -> String {
    let mut out = String::new();
    let summary = &report.summary;

    out.push_str("# Batch Ingest Report\n\n");
    out.push_str(&format!("- **Processed At:** {}\n", summary.processed_at));
    out.push_str(&format!("- **Total Files:** {}\n", summary.total_files));
    out.push_str(&format!("- **Successful:** {}\n", summary.successful));
    out.push_str(&format!("- **Failed:** {}\n", summary.failed));
    out.push_str(&format!("- **Skipped:** {}\n", summary.skipped));

    if !report.details.is_empty() {
        out.push_str("\n| File | Status | Serial | Error |\n");
        out.push_str("|------|--------|--------|-------|\n");
        for d in &report.details {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                d.path,
                d.status,
                opt(&d.serial),
                opt(&d.error)
            ));
        }
    }

    out
}

fn report_to_table(report: &BatchReport) -> String {
    let mut out = String::new();
    let width = report
        .details
        .iter()
        .map(|d| d.path.len())
        .max()
        .unwrap_or(4);
    for d in &report.details {
        out.push_str(&format!("{:<width$} {:<8} {}", d.path, d.status, opt(&d.serial)));
        if let Some(ref error) = d.error {
            out.push_str(&format!("  [{error}]"));
        }
        out.push('\n');
    }
    let summary = &report.summary;
    out.push_str(&format!(
        "{} files: {} ok, {} failed, {} skipped\n",
        summary.total_files, summary.successful, summary.failed, summary.skipped
    ));
    out
}
