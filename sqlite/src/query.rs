//! Read access to stored runs.
//!
//! [`RunQuery`] wraps a borrowed connection and table prefix. Listing
//! queries return lightweight [`RunSummary`] rows; full runs are rebuilt
//! through [`load_run`](crate::load_run).
//!
//! # Example
//!
//! ```no_run
//! use rusqlite::Connection;
//! use selftest_core::BatteryStatus;
//! use selftest_sqlite::RunQuery;
//!
//! let conn = Connection::open("diagnostics.db").unwrap();
//! let query = RunQuery::new(&conn, "st_").unwrap();
//!
//! if let Some(run) = query.latest_by_serial("PF3G44S9").unwrap() {
//!     println!("{} tests, {} failed", run.summary.total, run.summary.failed);
//! }
//!
//! for summary in query.runs_by_battery_status(BatteryStatus::Poor).unwrap() {
//!     println!("{} needs a new battery", summary.machine_serial);
//! }
//! ```

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use selftest_core::{BatteryStatus, DiagnosticRun};
use selftest_db::WritePolicy;
use serde::Serialize;

use crate::convert::{self, StoreReport};
use crate::error::{Result, SqliteError};
use crate::schema::validate_prefix;

/// One stored run, without component detail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub id: i64,
    pub machine_serial: String,
    pub machine_type_model: String,
    pub source_file: String,
    pub start_time: Option<DateTime<Utc>>,
    /// `None` when the run has no battery row.
    pub battery_status: Option<BatteryStatus>,
    pub total_tests: i64,
    pub failed_tests: i64,
    pub operator: Option<String>,
    /// No failed test and a battery verdict other than POOR.
    pub all_passed: bool,
}

/// A failed test with the run it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTest {
    pub system_id: i64,
    pub machine_serial: String,
    pub qualified_name: String,
    pub result_code: String,
}

/// Query interface over the stored runs.
pub struct RunQuery<'a> {
    conn: &'a Connection,
    prefix: String,
}

impl<'a> RunQuery<'a> {
    /// Creates a query interface for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
    pub fn new(conn: &'a Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Stores a run; see [`store_run`](crate::store_run).
    pub fn store(&self, run: &DiagnosticRun, policy: WritePolicy) -> Result<StoreReport> {
        convert::store_run(self.conn, &self.prefix, run, policy)
    }

    /// Loads one run by row ID.
    pub fn get_run(&self, id: i64) -> Result<Option<DiagnosticRun>> {
        convert::load_run(self.conn, &self.prefix, id)
    }

    /// Like [`get_run`](Self::get_run) but treats absence as an error.
    pub fn require_run(&self, id: i64) -> Result<DiagnosticRun> {
        self.get_run(id)?
            .ok_or_else(|| SqliteError::NotFound(format!("id {id}")))
    }

    /// Deletes one run and its component rows. Returns whether it existed.
    pub fn delete_run(&self, id: i64) -> Result<bool> {
        let deleted = self.conn.execute(
            &format!("DELETE FROM {}system_info WHERE id = ?1", self.prefix),
            params![id],
        )?;
        Ok(deleted > 0)
    }

    /// Lists every stored run ordered by serial, then insertion order.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        self.summaries("", None)
    }

    /// Lists runs whose battery verdict is `status`.
    pub fn runs_by_battery_status(&self, status: BatteryStatus) -> Result<Vec<RunSummary>> {
        self.summaries("WHERE b.validation_status = ?1", Some(status.as_str()))
    }

    /// Returns the most recent run for `serial`.
    ///
    /// Recency is the run's start time; runs without one rank below timed
    /// runs, and ties fall back to insertion order.
    pub fn latest_by_serial(&self, serial: &str) -> Result<Option<DiagnosticRun>> {
        let id: Option<i64> = self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM {}system_info WHERE machine_serial = ?1 \
                     ORDER BY start_time IS NULL, start_time DESC, id DESC LIMIT 1",
                    self.prefix
                ),
                params![serial],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.get_run(id),
            None => Ok(None),
        }
    }

    /// Lists failed tests, optionally restricted to one serial.
    pub fn failed_tests(&self, serial: Option<&str>) -> Result<Vec<FailedTest>> {
        let p = &self.prefix;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT s.id, s.machine_serial, t.qualified_name, t.result_code \
             FROM {p}test_results t JOIN {p}system_info s ON s.id = t.system_id \
             WHERE t.passed = 0 AND (?1 IS NULL OR s.machine_serial = ?1) \
             ORDER BY s.machine_serial, s.id, t.position"
        ))?;
        let rows = stmt
            .query_map(params![serial], |row| {
                Ok(FailedTest {
                    system_id: row.get(0)?,
                    machine_serial: row.get(1)?,
                    qualified_name: row.get(2)?,
                    result_code: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn summaries(&self, filter: &str, arg: Option<&str>) -> Result<Vec<RunSummary>> {
        let p = &self.prefix;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT s.id, s.machine_serial, s.machine_type_model, s.source_file, s.start_time, \
             b.validation_status, s.total_tests, s.failed_tests, s.operator, s.all_passed \
             FROM {p}system_info s LEFT JOIN {p}battery b ON b.system_id = s.id \
             {filter} ORDER BY s.machine_serial, s.id"
        ))?;

        let raw = match arg {
            Some(arg) => stmt.query_map(params![arg], summary_row)?,
            None => stmt.query_map([], summary_row)?,
        }
        .collect::<std::result::Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(
                |(
                    (id, machine_serial, machine_type_model, source_file, start, status),
                    (total, failed, operator, all_passed),
                )|
                 -> Result<RunSummary> {
                    let start_time = convert::string_to_timestamp(start)?;
                    let battery_status = status
                        .map(|s| {
                            BatteryStatus::parse(&s)
                                .ok_or_else(|| convert::unknown("battery status", &s))
                        })
                        .transpose()?;
                    Ok(RunSummary {
                        id,
                        machine_serial,
                        machine_type_model,
                        source_file,
                        start_time,
                        battery_status,
                        total_tests: total,
                        failed_tests: failed,
                        operator,
                        all_passed,
                    })
                },
            )
            .collect()
    }
}

type SummaryRow = (
    (i64, String, String, String, Option<String>, Option<String>),
    (i64, i64, Option<String>, bool),
);

fn summary_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRow> {
    Ok((
        (
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
        ),
        (row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?),
    ))
}
