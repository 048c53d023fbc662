//! Diagnostic run validation.
//!
//! Checks the structural invariants of an assembled [`DiagnosticRun`] before
//! it is persisted: tallies that disagree with the outcome list, a battery
//! verdict that contradicts its health figure, or a memory module count that
//! does not match its module list. Timestamp oddities such as a finish time
//! before the start time are data-quality warnings on the run, not errors.
//!
//! # Examples
//!
//! ```
//! use selftest_core::*;
//!
//! let mut run = DiagnosticRun::new("PF3G44S9.log", SourceFormat::Text);
//! run.push_test(TestOutcome::new(Some("CPU"), "CORE_TEST", "PASSED", true));
//! assert!(validate_run(&run).is_empty());
//!
//! // Tampered tallies are reported
//! run.summary.total = 5;
//! assert!(!validate_run(&run).is_empty());
//! ```

use thiserror::Error;

use crate::{BatteryStatus, DiagnosticRun};

/// Run validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunValidationError {
    /// Machine serial is empty or whitespace-only.
    #[error("machine serial cannot be empty")]
    EmptySerial,
    /// Outcome list length differs from the summary total.
    #[error("test count mismatch: {listed} outcomes, summary total {total}")]
    TestCountMismatch { listed: i64, total: i64 },
    /// `passed + failed` differs from the summary total.
    #[error("tally mismatch: {passed} passed + {failed} failed != {total}")]
    TallyMismatch { passed: i64, failed: i64, total: i64 },
    /// Passed outcomes in the list differ from the summary's passed count.
    #[error("passed count mismatch: {listed} listed, summary {summary}")]
    PassedCountMismatch { listed: i64, summary: i64 },
    /// Battery health is set although a capacity is missing or non-positive.
    #[error("battery health defined without positive capacities")]
    HealthWithoutCapacity,
    /// Battery status is UNKNOWN with a health figure, or vice versa.
    #[error("battery status {0} inconsistent with health percentage")]
    InconsistentBatteryStatus(String),
    /// Memory module count differs from the module list.
    #[error("memory module count {count} != {listed} listed modules")]
    ModuleCountMismatch { count: i64, listed: i64 },
}

/// Validates a diagnostic run.
///
/// Returns every violation found; an empty vector means the run is sound.
pub fn validate_run(run: &DiagnosticRun) -> Vec<RunValidationError> {
    let mut errors = Vec::new();

    if run.system.machine_serial.trim().is_empty() {
        errors.push(RunValidationError::EmptySerial);
    }

    let summary = &run.summary;
    let listed = run.tests.len() as i64;
    if listed != summary.total {
        errors.push(RunValidationError::TestCountMismatch {
            listed,
            total: summary.total,
        });
    }
    if summary.passed + summary.failed != summary.total {
        errors.push(RunValidationError::TallyMismatch {
            passed: summary.passed,
            failed: summary.failed,
            total: summary.total,
        });
    }
    let listed_passed = run.tests.iter().filter(|t| t.passed).count() as i64;
    if listed_passed != summary.passed {
        errors.push(RunValidationError::PassedCountMismatch {
            listed: listed_passed,
            summary: summary.passed,
        });
    }

    if let Some(battery) = &run.battery {
        let capacities_ok = matches!(
            (battery.design_capacity_mwh, battery.full_charge_capacity_mwh),
            (Some(d), Some(f)) if d > 0 && f > 0
        );
        if battery.health_percentage.is_some() && !capacities_ok {
            errors.push(RunValidationError::HealthWithoutCapacity);
        }
        let unknown = battery.validation.status == BatteryStatus::Unknown;
        if unknown != battery.health_percentage.is_none() {
            errors.push(RunValidationError::InconsistentBatteryStatus(
                battery.validation.status.as_str().to_string(),
            ));
        }
    }

    if let Some(memory) = &run.memory {
        let listed = memory.modules.len() as i64;
        if memory.module_count != listed {
            errors.push(RunValidationError::ModuleCountMismatch {
                count: memory.module_count,
                listed,
            });
        }
    }

    errors
}
