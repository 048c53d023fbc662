//! SQLite storage for normalized diagnostic runs.
//!
//! A [`DiagnosticRun`](selftest_core::DiagnosticRun) is stored across nine
//! prefixed tables (one root `system_info` row plus component, memory
//! module, and test result rows) and can be rebuilt without loss.
//!
//! # Architecture
//!
//! - **`schema`**: SQL generation with customizable table prefixes
//! - **`migration`**: lifecycle operations (up/down/status/clear)
//! - **`convert`**: run ↔ row conversion honoring a [`WritePolicy`]
//! - **`query`**: listing and lookup of stored runs
//!
//! # Quick start
//!
//! ```no_run
//! use rusqlite::Connection;
//! use selftest_core::{DiagnosticRun, SourceFormat};
//! use selftest_sqlite::{Migration, RunQuery, WritePolicy, store_run};
//!
//! let conn = Connection::open("diagnostics.db").unwrap();
//! let mut migration = Migration::new(conn, "st_").unwrap();
//! migration.up().unwrap();
//! let conn = migration.into_connection();
//!
//! let mut run = DiagnosticRun::new("PF3G44S9-2025-08-07-202945.log", SourceFormat::Text);
//! run.system.machine_serial = "PF3G44S9".into();
//! store_run(&conn, "st_", &run, WritePolicy::Upsert).unwrap();
//!
//! let query = RunQuery::new(&conn, "st_").unwrap();
//! assert!(query.latest_by_serial("PF3G44S9").unwrap().is_some());
//! ```
//!
//! # Table prefix customization
//!
//! Table and index names carry a prefix made of ASCII alphanumerics and
//! underscores, so several isolated run sets can share one database file.

mod convert;
mod error;
mod migration;
mod query;
mod schema;

pub use convert::{StoreReport, load_run, store_run};
pub use error::{Result, SqliteError};
pub use migration::{Migration, MigrationStatus, TableStatus};
pub use query::{FailedTest, RunQuery, RunSummary};
pub use schema::{TABLES, generate_drop_sql, generate_schema_sql};
pub use selftest_db::WritePolicy;
