//! SQL schema generation with customizable table prefixes.
//!
//! One run is stored as a `{prefix}system_info` row plus one row per
//! present component and one row per memory module and test outcome:
//!
//! - `{prefix}system_info`: identity, timing, source, warnings, summary
//! - `{prefix}battery`, `{prefix}display`, `{prefix}cpu`, `{prefix}memory`,
//!   `{prefix}storage`, `{prefix}motherboard`: at most one row per run
//! - `{prefix}memory_modules`: per-module detail, ordered by `position`
//! - `{prefix}test_results`: individual outcomes, ordered by `position`
//!
//! Every child table references `system_info(id)` with `ON DELETE CASCADE`,
//! so deleting a run removes all of its rows.

use crate::error::{Result, SqliteError};

/// Child tables in dependency order (children first), followed by the root.
pub const TABLES: [&str; 9] = [
    "test_results",
    "memory_modules",
    "battery",
    "display",
    "cpu",
    "memory",
    "storage",
    "motherboard",
    "system_info",
];

/// Validates that a table prefix contains only ASCII alphanumerics and
/// underscores. An empty prefix is allowed and yields bare table names.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Generates the complete SQL schema for all tables with the given prefix.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix contains characters
/// other than ASCII alphanumerics and underscores.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    let sql = format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}system_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    machine_serial TEXT NOT NULL,
    serial_source TEXT NOT NULL DEFAULT 'unknown',
    machine_model TEXT,
    machine_type_model TEXT NOT NULL,
    bios_version TEXT,
    application_version TEXT,
    execution_type TEXT,
    start_time TEXT,
    finish_time TEXT,
    elapsed_seconds INTEGER,
    source_format TEXT NOT NULL CHECK (source_format IN ('text', 'json')),
    source_file TEXT NOT NULL,
    warnings TEXT NOT NULL DEFAULT '[]',
    total_tests INTEGER NOT NULL DEFAULT 0,
    passed_tests INTEGER NOT NULL DEFAULT 0,
    failed_tests INTEGER NOT NULL DEFAULT 0,
    warning_tests INTEGER NOT NULL DEFAULT 0,
    canceled_tests INTEGER NOT NULL DEFAULT 0,
    not_applicable_tests INTEGER NOT NULL DEFAULT 0,
    final_result_code TEXT,
    reported_elapsed TEXT,
    operator TEXT,
    all_passed INTEGER NOT NULL DEFAULT 0 CHECK (all_passed IN (0, 1)),
    ingested_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS {prefix}battery (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id INTEGER NOT NULL UNIQUE,
    serial_number TEXT,
    manufacturer TEXT,
    design_capacity_mwh INTEGER,
    full_charge_capacity_mwh INTEGER,
    cycle_count INTEGER,
    health_percentage REAL,
    validation_status TEXT NOT NULL CHECK (validation_status IN ('GOOD', 'FAIR', 'POOR', 'UNKNOWN')),
    validation_message TEXT NOT NULL,
    FOREIGN KEY (system_id) REFERENCES {prefix}system_info(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}display (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id INTEGER NOT NULL UNIQUE,
    name TEXT,
    model_name TEXT,
    manufacturer_id TEXT,
    edid_version TEXT,
    width INTEGER,
    height INTEGER,
    FOREIGN KEY (system_id) REFERENCES {prefix}system_info(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}cpu (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id INTEGER NOT NULL UNIQUE,
    model TEXT,
    vendor TEXT,
    cores INTEGER,
    threads INTEGER,
    current_speed TEXT,
    max_speed TEXT,
    cache_l1 TEXT,
    cache_l2 TEXT,
    cache_l3 TEXT,
    features TEXT,
    FOREIGN KEY (system_id) REFERENCES {prefix}system_info(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}memory (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id INTEGER NOT NULL UNIQUE,
    total_mb INTEGER,
    total_gb INTEGER,
    module_count INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (system_id) REFERENCES {prefix}system_info(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}memory_modules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    module_type TEXT,
    manufacturer TEXT,
    part_number TEXT,
    serial_number TEXT,
    speed TEXT,
    size_gb REAL,
    device_locator TEXT,
    bank_locator TEXT,
    FOREIGN KEY (system_id) REFERENCES {prefix}system_info(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}storage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id INTEGER NOT NULL UNIQUE,
    model TEXT,
    serial_number TEXT,
    manufacturer TEXT,
    device_type TEXT,
    firmware TEXT,
    temperature_c INTEGER,
    size_gb REAL,
    information_size TEXT,
    FOREIGN KEY (system_id) REFERENCES {prefix}system_info(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}motherboard (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id INTEGER NOT NULL UNIQUE,
    usb_host_controllers INTEGER,
    pci_devices INTEGER,
    rtc_present TEXT,
    eight_s_code TEXT,
    thunderbolt_firmware TEXT,
    FOREIGN KEY (system_id) REFERENCES {prefix}system_info(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS {prefix}test_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    system_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    component TEXT,
    name TEXT NOT NULL,
    qualified_name TEXT NOT NULL,
    result_code TEXT NOT NULL,
    passed INTEGER NOT NULL DEFAULT 0,
    start_time TEXT,
    end_time TEXT,
    duration_seconds INTEGER,
    FOREIGN KEY (system_id) REFERENCES {prefix}system_info(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_{prefix}system_info_serial ON {prefix}system_info(machine_serial);
CREATE INDEX IF NOT EXISTS idx_{prefix}memory_modules_system ON {prefix}memory_modules(system_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}test_results_system ON {prefix}test_results(system_id);
CREATE INDEX IF NOT EXISTS idx_{prefix}test_results_passed ON {prefix}test_results(passed);
CREATE INDEX IF NOT EXISTS idx_{prefix}battery_status ON {prefix}battery(validation_status);
"#,
        prefix = prefix
    );

    Ok(sql)
}

/// Generates SQL to drop all tables in reverse dependency order.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn generate_drop_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    Ok(TABLES
        .iter()
        .map(|table| format!("DROP TABLE IF EXISTS {prefix}{table};\n"))
        .collect())
}
