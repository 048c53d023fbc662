//! Core diagnostic run types and shared evaluation primitives.
//!
//! This crate defines the normalized model for one execution of a vendor
//! hardware self-test:
//!
//! - [`DiagnosticRun`]: the root record (system identity, component
//!   snapshots, test outcomes, summary).
//! - [`BatteryRecord`], [`DisplayRecord`], [`CpuRecord`], [`MemoryRecord`],
//!   [`StorageRecord`], [`MotherboardRecord`]: fixed-shape component
//!   records exposed uniformly through [`ComponentRecord`].
//! - [`TestOutcome`] and [`TestSummary`]: individual results and tallies.
//!
//! Battery scoring ([`BatteryPolicy`]) is a pure, total function over
//! capacities and cycle count. Validation ([`validate_run`]) checks run
//! invariants before persistence, and [`reconcile_runs`] merges the text
//! and JSON parses of the same run using a [`MergeStrategy`].
//!
//! # Example
//!
//! ```
//! use selftest_core::*;
//!
//! let mut run = DiagnosticRun::new("PF3G44S9-2025-08-07-202945.log", SourceFormat::Text);
//! run.system.machine_serial = "PF3G44S9".into();
//!
//! let (health, validation) = BatteryPolicy::default().evaluate(Some(57000), Some(50270), Some(120));
//! run.battery = Some(BatteryRecord {
//!     design_capacity_mwh: Some(57000),
//!     full_charge_capacity_mwh: Some(50270),
//!     cycle_count: Some(120),
//!     health_percentage: health,
//!     validation,
//!     ..BatteryRecord::default()
//! });
//! run.push_test(TestOutcome::new(Some("BATTERY"), "HEALTH_TEST", "PASSED", true));
//!
//! assert_eq!(run.battery.as_ref().unwrap().validation.status, BatteryStatus::Good);
//! assert!(validate_run(&run).is_empty());
//! ```

mod battery;
mod merge;
mod types;
mod validate;

pub use battery::{BatteryPolicy, BatteryStatus, BatteryValidation, Threshold, health_percentage};
pub use merge::{MergeStrategy, reconcile_runs};
pub use types::*;
pub use validate::{RunValidationError, validate_run};
