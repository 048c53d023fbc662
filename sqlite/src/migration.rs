//! Migration lifecycle operations for the run tables.
//!
//! Provides [`Migration`] for creating, dropping, inspecting, and clearing
//! the table set under one prefix. All mutation operations run in a
//! transaction.
//!
//! # Example
//!
//! ```no_run
//! use selftest_sqlite::Migration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("diagnostics.db").unwrap();
//! let mut migration = Migration::new(conn, "st_").unwrap();
//!
//! migration.up().unwrap();
//!
//! let status = migration.status().unwrap();
//! assert!(status.tables_exist);
//! for table in &status.tables {
//!     println!("{}: {}", table.name, table.rows);
//! }
//!
//! migration.clear().unwrap();
//! migration.down().unwrap();
//! ```

use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::schema::{TABLES, generate_drop_sql, generate_schema_sql, validate_prefix};

/// Manages the lifecycle of the prefixed tables on one connection.
pub struct Migration {
    conn: Connection,
    prefix: String,
}

impl Migration {
    /// Creates a migration manager for the given connection and table prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`](crate::SqliteError::InvalidPrefix)
    /// if the prefix contains invalid characters.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn, prefix })
    }

    /// Creates all tables and indexes.
    ///
    /// Uses `CREATE TABLE IF NOT EXISTS`, so it is safe to call repeatedly.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)?;
        tx.commit()?;
        info!(prefix = %self.prefix, "tables created");
        Ok(())
    }

    /// Drops all tables, children first.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)?;
        tx.commit()?;
        info!(prefix = %self.prefix, "tables dropped");
        Ok(())
    }

    /// Reports whether the tables exist and how many rows each holds.
    pub fn status(&self) -> Result<MigrationStatus> {
        if !self.table_exists("system_info")? {
            return Ok(MigrationStatus {
                prefix: self.prefix.clone(),
                tables_exist: false,
                tables: Vec::new(),
            });
        }

        let mut tables = Vec::with_capacity(TABLES.len());
        for table in TABLES.iter().rev() {
            let rows = if self.table_exists(table)? {
                self.count_rows(table)?
            } else {
                0
            };
            tables.push(TableStatus {
                name: format!("{}{}", self.prefix, table),
                rows,
            });
        }

        Ok(MigrationStatus {
            prefix: self.prefix.clone(),
            tables_exist: true,
            tables,
        })
    }

    /// Deletes every row, children first, keeping the tables.
    ///
    /// Returns the total number of rows removed. Does nothing when the
    /// tables do not exist.
    pub fn clear(&mut self) -> Result<usize> {
        if !self.table_exists("system_info")? {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut removed = 0;
        for table in TABLES {
            removed += tx.execute(&format!("DELETE FROM {}{}", self.prefix, table), [])?;
        }
        tx.commit()?;
        info!(prefix = %self.prefix, removed, "tables cleared");
        Ok(removed)
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Consumes the migration and returns the underlying connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let table_name = format!("{}{}", self.prefix, table);
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
            [&table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn count_rows(&self, table: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}{}", self.prefix, table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// Row count of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStatus {
    /// Prefixed table name.
    pub name: String,
    pub rows: usize,
}

/// Snapshot returned by [`Migration::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub prefix: String,
    /// Whether the root `system_info` table exists.
    pub tables_exist: bool,
    /// Per-table counts, root first; empty when the tables do not exist.
    pub tables: Vec<TableStatus>,
}

impl MigrationStatus {
    /// Number of stored runs.
    pub fn run_count(&self) -> usize {
        self.rows_in("system_info")
    }

    /// Rows in the table with the given unprefixed name.
    pub fn rows_in(&self, table: &str) -> usize {
        let name = format!("{}{}", self.prefix, table);
        self.tables
            .iter()
            .find(|t| t.name == name)
            .map_or(0, |t| t.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_new_validates_prefix() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(Migration::new(conn, "valid_prefix_").is_ok());

        let conn = Connection::open_in_memory().unwrap();
        assert!(Migration::new(conn, "drop;--").is_err());
    }

    #[test]
    fn test_status_on_empty_database() {
        let conn = Connection::open_in_memory().unwrap();
        let migration = Migration::new(conn, "st_").unwrap();
        let status = migration.status().unwrap();
        assert!(!status.tables_exist);
        assert!(status.tables.is_empty());
        assert_eq!(status.run_count(), 0);
    }

    #[test]
    fn test_up_and_status() {
        let conn = Connection::open_in_memory().unwrap();
        let mut migration = Migration::new(conn, "st_").unwrap();
        migration.up().unwrap();

        let status = migration.status().unwrap();
        assert!(status.tables_exist);
        assert_eq!(status.tables.len(), TABLES.len());
        assert_eq!(status.tables[0].name, "st_system_info");
        assert!(status.tables.iter().all(|t| t.rows == 0));
    }

    #[test]
    fn test_up_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let mut migration = Migration::new(conn, "st_").unwrap();
        migration.up().unwrap();
        migration.up().unwrap();
        assert!(migration.status().unwrap().tables_exist);
    }

    #[test]
    fn test_down_removes_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let mut migration = Migration::new(conn, "st_").unwrap();
        migration.up().unwrap();
        migration.down().unwrap();
        assert!(!migration.status().unwrap().tables_exist);
        migration.down().unwrap();
    }

    #[test]
    fn test_clear_without_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let mut migration = Migration::new(conn, "st_").unwrap();
        assert_eq!(migration.clear().unwrap(), 0);
    }

    #[test]
    fn test_prefixes_are_isolated() {
        let conn = Connection::open_in_memory().unwrap();
        let mut a = Migration::new(conn, "a_").unwrap();
        a.up().unwrap();
        let conn = a.into_connection();

        let b = Migration::new(conn, "b_").unwrap();
        assert!(!b.status().unwrap().tables_exist);
    }
}
