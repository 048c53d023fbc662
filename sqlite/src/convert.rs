//! Conversion between [`DiagnosticRun`] and SQLite rows.
//!
//! [`store_run`] writes a run across the normalized tables inside one
//! transaction; [`load_run`] rebuilds it. Every field of the run survives
//! the round trip: timestamps are stored as RFC 3339 text, warnings as a
//! JSON array, and memory modules and test outcomes keep their order through
//! a `position` column.
//!
//! # Write policy
//!
//! With [`WritePolicy::Upsert`] every stored run with the same machine
//! serial is deleted (children cascade) before the new run is inserted.
//! Runs whose serial could not be resolved are never treated as duplicates
//! of each other. [`WritePolicy::Append`] always inserts.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use selftest_core::{
    BatteryRecord, BatteryStatus, BatteryValidation, CpuRecord, DiagnosticRun, DisplayRecord,
    MemoryModule, MemoryRecord, MotherboardRecord, SerialSource, SourceFormat, StorageRecord,
    SystemInfo, TestOutcome, TestSummary, UNKNOWN_SERIAL, validate_run,
};
use selftest_db::WritePolicy;
use tracing::debug;

use crate::error::{Result, SqliteError};
use crate::schema::validate_prefix;

/// Outcome of [`store_run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreReport {
    /// Row ID of the new `system_info` row.
    pub system_id: i64,
    /// Earlier runs removed by [`WritePolicy::Upsert`].
    pub replaced: usize,
}

fn timestamp_to_string(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339())
}

pub(crate) fn string_to_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| SqliteError::ConversionError(format!("invalid timestamp '{s}': {e}")))
        })
        .transpose()
}

pub(crate) fn unknown(kind: &str, value: &str) -> SqliteError {
    SqliteError::ConversionError(format!("unknown {kind}: {value}"))
}

/// Validates and stores one run, returning its `system_info` row ID.
///
/// # Errors
///
/// Returns [`SqliteError::ValidationError`] if the run violates its
/// invariants (nothing is written), or [`SqliteError::DatabaseError`] if any
/// insert fails (the transaction is rolled back).
pub fn store_run(
    conn: &Connection,
    prefix: &str,
    run: &DiagnosticRun,
    policy: WritePolicy,
) -> Result<StoreReport> {
    validate_prefix(prefix)?;

    let violations = validate_run(run);
    if !violations.is_empty() {
        let message = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(SqliteError::ValidationError(message));
    }

    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    let tx = conn.unchecked_transaction()?;

    let serial = &run.system.machine_serial;
    let replaced = match policy {
        WritePolicy::Upsert if serial != UNKNOWN_SERIAL => tx.execute(
            &format!("DELETE FROM {prefix}system_info WHERE machine_serial = ?1"),
            params![serial],
        )?,
        _ => 0,
    };

    let system_id = insert_system(&tx, prefix, run)?;
    if let Some(battery) = &run.battery {
        insert_battery(&tx, prefix, system_id, battery)?;
    }
    if let Some(display) = &run.display {
        insert_display(&tx, prefix, system_id, display)?;
    }
    if let Some(cpu) = &run.cpu {
        insert_cpu(&tx, prefix, system_id, cpu)?;
    }
    if let Some(memory) = &run.memory {
        insert_memory(&tx, prefix, system_id, memory)?;
    }
    if let Some(storage) = &run.storage {
        insert_storage(&tx, prefix, system_id, storage)?;
    }
    if let Some(motherboard) = &run.motherboard {
        insert_motherboard(&tx, prefix, system_id, motherboard)?;
    }
    insert_tests(&tx, prefix, system_id, &run.tests)?;

    tx.commit()?;
    debug!(
        serial = %serial,
        system_id,
        replaced,
        policy = policy.as_str(),
        "stored run"
    );
    Ok(StoreReport { system_id, replaced })
}

fn insert_system(conn: &Connection, prefix: &str, run: &DiagnosticRun) -> Result<i64> {
    let system = &run.system;
    let summary = &run.summary;
    let warnings = serde_json::to_string(&run.warnings)?;
    conn.execute(
        &format!(
            "INSERT INTO {prefix}system_info (machine_serial, serial_source, machine_model, machine_type_model, \
             bios_version, application_version, execution_type, start_time, finish_time, elapsed_seconds, \
             source_format, source_file, warnings, total_tests, passed_tests, failed_tests, warning_tests, \
             canceled_tests, not_applicable_tests, final_result_code, reported_elapsed, operator, all_passed) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, \
             ?21, ?22, ?23)"
        ),
        params![
            system.machine_serial,
            system.serial_source.as_str(),
            system.machine_model,
            system.machine_type_model,
            system.bios_version,
            system.application_version,
            system.execution_type,
            timestamp_to_string(system.start_time),
            timestamp_to_string(system.finish_time),
            system.elapsed_seconds,
            run.source_format.as_str(),
            run.source_file,
            warnings,
            summary.total,
            summary.passed,
            summary.failed,
            summary.warning,
            summary.canceled,
            summary.not_applicable,
            summary.final_result_code,
            summary.reported_elapsed,
            run.operator,
            run.all_passed(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_battery(conn: &Connection, prefix: &str, system_id: i64, b: &BatteryRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}battery (system_id, serial_number, manufacturer, design_capacity_mwh, \
             full_charge_capacity_mwh, cycle_count, health_percentage, validation_status, validation_message) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            system_id,
            b.serial_number,
            b.manufacturer,
            b.design_capacity_mwh,
            b.full_charge_capacity_mwh,
            b.cycle_count,
            b.health_percentage,
            b.validation.status.as_str(),
            b.validation.message,
        ],
    )?;
    Ok(())
}

fn insert_display(conn: &Connection, prefix: &str, system_id: i64, d: &DisplayRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}display (system_id, name, model_name, manufacturer_id, edid_version, width, height) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        params![
            system_id,
            d.name,
            d.model_name,
            d.manufacturer_id,
            d.edid_version,
            d.width,
            d.height,
        ],
    )?;
    Ok(())
}

fn insert_cpu(conn: &Connection, prefix: &str, system_id: i64, c: &CpuRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}cpu (system_id, model, vendor, cores, threads, current_speed, max_speed, \
             cache_l1, cache_l2, cache_l3, features) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            system_id,
            c.model,
            c.vendor,
            c.cores,
            c.threads,
            c.current_speed,
            c.max_speed,
            c.cache_l1,
            c.cache_l2,
            c.cache_l3,
            c.features,
        ],
    )?;
    Ok(())
}

fn insert_memory(conn: &Connection, prefix: &str, system_id: i64, m: &MemoryRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}memory (system_id, total_mb, total_gb, module_count) VALUES (?1, ?2, ?3, ?4)"
        ),
        params![system_id, m.total_mb, m.total_gb(), m.module_count],
    )?;

    for (position, module) in m.modules.iter().enumerate() {
        conn.execute(
            &format!(
                "INSERT INTO {prefix}memory_modules (system_id, position, module_type, manufacturer, \
                 part_number, serial_number, speed, size_gb, device_locator, bank_locator) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ),
            params![
                system_id,
                position as i64,
                module.module_type,
                module.manufacturer,
                module.part_number,
                module.serial_number,
                module.speed,
                module.size_gb,
                module.device_locator,
                module.bank_locator,
            ],
        )?;
    }
    Ok(())
}

fn insert_storage(conn: &Connection, prefix: &str, system_id: i64, s: &StorageRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}storage (system_id, model, serial_number, manufacturer, device_type, \
             firmware, temperature_c, size_gb, information_size) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        ),
        params![
            system_id,
            s.model,
            s.serial_number,
            s.manufacturer,
            s.device_type,
            s.firmware,
            s.temperature_c,
            s.size_gb,
            s.information_size,
        ],
    )?;
    Ok(())
}

fn insert_motherboard(
    conn: &Connection,
    prefix: &str,
    system_id: i64,
    m: &MotherboardRecord,
) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {prefix}motherboard (system_id, usb_host_controllers, pci_devices, rtc_present, \
             eight_s_code, thunderbolt_firmware) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ),
        params![
            system_id,
            m.usb_host_controllers,
            m.pci_devices,
            m.rtc_present,
            m.eight_s_code,
            m.thunderbolt_firmware,
        ],
    )?;
    Ok(())
}

fn insert_tests(conn: &Connection, prefix: &str, system_id: i64, tests: &[TestOutcome]) -> Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {prefix}test_results (system_id, position, component, name, qualified_name, \
         result_code, passed, start_time, end_time, duration_seconds) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
    ))?;
    for (position, test) in tests.iter().enumerate() {
        stmt.execute(params![
            system_id,
            position as i64,
            test.component,
            test.name,
            test.qualified_name,
            test.result_code,
            test.passed as i32,
            timestamp_to_string(test.start_time),
            timestamp_to_string(test.end_time),
            test.duration_seconds,
        ])?;
    }
    Ok(())
}

/// `system_info` columns as stored, before enum and timestamp decoding.
struct SystemRow {
    machine_serial: String,
    serial_source: String,
    machine_model: Option<String>,
    machine_type_model: String,
    bios_version: Option<String>,
    application_version: Option<String>,
    execution_type: Option<String>,
    start_time: Option<String>,
    finish_time: Option<String>,
    elapsed_seconds: Option<i64>,
    source_format: String,
    source_file: String,
    warnings: String,
    summary: TestSummary,
    operator: Option<String>,
}

/// Rebuilds the run stored under `system_id`.
///
/// Returns `None` if no such run exists.
pub fn load_run(conn: &Connection, prefix: &str, system_id: i64) -> Result<Option<DiagnosticRun>> {
    validate_prefix(prefix)?;

    let row = conn
        .query_row(
            &format!(
                "SELECT machine_serial, serial_source, machine_model, machine_type_model, bios_version, \
                 application_version, execution_type, start_time, finish_time, elapsed_seconds, \
                 source_format, source_file, warnings, total_tests, passed_tests, failed_tests, \
                 warning_tests, canceled_tests, not_applicable_tests, final_result_code, reported_elapsed, \
                 operator \
                 FROM {prefix}system_info WHERE id = ?1"
            ),
            params![system_id],
            |row| {
                Ok(SystemRow {
                    machine_serial: row.get(0)?,
                    serial_source: row.get(1)?,
                    machine_model: row.get(2)?,
                    machine_type_model: row.get(3)?,
                    bios_version: row.get(4)?,
                    application_version: row.get(5)?,
                    execution_type: row.get(6)?,
                    start_time: row.get(7)?,
                    finish_time: row.get(8)?,
                    elapsed_seconds: row.get(9)?,
                    source_format: row.get(10)?,
                    source_file: row.get(11)?,
                    warnings: row.get(12)?,
                    summary: TestSummary {
                        total: row.get(13)?,
                        passed: row.get(14)?,
                        failed: row.get(15)?,
                        warning: row.get(16)?,
                        canceled: row.get(17)?,
                        not_applicable: row.get(18)?,
                        final_result_code: row.get(19)?,
                        reported_elapsed: row.get(20)?,
                    },
                    operator: row.get(21)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let source_format = SourceFormat::parse(&row.source_format)
        .ok_or_else(|| unknown("source format", &row.source_format))?;
    let serial_source = SerialSource::parse(&row.serial_source)
        .ok_or_else(|| unknown("serial source", &row.serial_source))?;

    let run = DiagnosticRun {
        source_file: row.source_file,
        source_format,
        system: SystemInfo {
            machine_serial: row.machine_serial,
            serial_source,
            machine_model: row.machine_model,
            machine_type_model: row.machine_type_model,
            bios_version: row.bios_version,
            application_version: row.application_version,
            execution_type: row.execution_type,
            start_time: string_to_timestamp(row.start_time)?,
            finish_time: string_to_timestamp(row.finish_time)?,
            elapsed_seconds: row.elapsed_seconds,
        },
        battery: load_battery(conn, prefix, system_id)?,
        display: load_display(conn, prefix, system_id)?,
        cpu: load_cpu(conn, prefix, system_id)?,
        memory: load_memory(conn, prefix, system_id)?,
        storage: load_storage(conn, prefix, system_id)?,
        motherboard: load_motherboard(conn, prefix, system_id)?,
        tests: load_tests(conn, prefix, system_id)?,
        summary: row.summary,
        warnings: serde_json::from_str(&row.warnings)?,
        operator: row.operator,
    };
    Ok(Some(run))
}

fn load_battery(conn: &Connection, prefix: &str, system_id: i64) -> Result<Option<BatteryRecord>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT serial_number, manufacturer, design_capacity_mwh, full_charge_capacity_mwh, \
                 cycle_count, health_percentage, validation_status, validation_message \
                 FROM {prefix}battery WHERE system_id = ?1"
            ),
            params![system_id],
            |row| {
                let record = BatteryRecord {
                    serial_number: row.get(0)?,
                    manufacturer: row.get(1)?,
                    design_capacity_mwh: row.get(2)?,
                    full_charge_capacity_mwh: row.get(3)?,
                    cycle_count: row.get(4)?,
                    health_percentage: row.get(5)?,
                    validation: BatteryValidation {
                        status: BatteryStatus::Unknown,
                        message: row.get(7)?,
                    },
                };
                Ok((record, row.get::<_, String>(6)?))
            },
        )
        .optional()?;

    let Some((mut record, status)) = row else {
        return Ok(None);
    };
    record.validation.status =
        BatteryStatus::parse(&status).ok_or_else(|| unknown("battery status", &status))?;
    Ok(Some(record))
}

fn load_display(conn: &Connection, prefix: &str, system_id: i64) -> Result<Option<DisplayRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT name, model_name, manufacturer_id, edid_version, width, height \
                 FROM {prefix}display WHERE system_id = ?1"
            ),
            params![system_id],
            |row| {
                Ok(DisplayRecord {
                    name: row.get(0)?,
                    model_name: row.get(1)?,
                    manufacturer_id: row.get(2)?,
                    edid_version: row.get(3)?,
                    width: row.get(4)?,
                    height: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

fn load_cpu(conn: &Connection, prefix: &str, system_id: i64) -> Result<Option<CpuRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT model, vendor, cores, threads, current_speed, max_speed, cache_l1, cache_l2, \
                 cache_l3, features FROM {prefix}cpu WHERE system_id = ?1"
            ),
            params![system_id],
            |row| {
                Ok(CpuRecord {
                    model: row.get(0)?,
                    vendor: row.get(1)?,
                    cores: row.get(2)?,
                    threads: row.get(3)?,
                    current_speed: row.get(4)?,
                    max_speed: row.get(5)?,
                    cache_l1: row.get(6)?,
                    cache_l2: row.get(7)?,
                    cache_l3: row.get(8)?,
                    features: row.get(9)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

fn load_memory(conn: &Connection, prefix: &str, system_id: i64) -> Result<Option<MemoryRecord>> {
    let header = conn
        .query_row(
            &format!("SELECT total_mb, module_count FROM {prefix}memory WHERE system_id = ?1"),
            params![system_id],
            |row| Ok((row.get::<_, Option<i64>>(0)?, row.get::<_, i64>(1)?)),
        )
        .optional()?;
    let Some((total_mb, module_count)) = header else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(&format!(
        "SELECT module_type, manufacturer, part_number, serial_number, speed, size_gb, \
         device_locator, bank_locator FROM {prefix}memory_modules \
         WHERE system_id = ?1 ORDER BY position"
    ))?;
    let modules = stmt
        .query_map(params![system_id], |row| {
            Ok(MemoryModule {
                module_type: row.get(0)?,
                manufacturer: row.get(1)?,
                part_number: row.get(2)?,
                serial_number: row.get(3)?,
                speed: row.get(4)?,
                size_gb: row.get(5)?,
                device_locator: row.get(6)?,
                bank_locator: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Some(MemoryRecord {
        total_mb,
        module_count,
        modules,
    }))
}

fn load_storage(conn: &Connection, prefix: &str, system_id: i64) -> Result<Option<StorageRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT model, serial_number, manufacturer, device_type, firmware, temperature_c, \
                 size_gb, information_size FROM {prefix}storage WHERE system_id = ?1"
            ),
            params![system_id],
            |row| {
                Ok(StorageRecord {
                    model: row.get(0)?,
                    serial_number: row.get(1)?,
                    manufacturer: row.get(2)?,
                    device_type: row.get(3)?,
                    firmware: row.get(4)?,
                    temperature_c: row.get(5)?,
                    size_gb: row.get(6)?,
                    information_size: row.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

fn load_motherboard(
    conn: &Connection,
    prefix: &str,
    system_id: i64,
) -> Result<Option<MotherboardRecord>> {
    let record = conn
        .query_row(
            &format!(
                "SELECT usb_host_controllers, pci_devices, rtc_present, eight_s_code, thunderbolt_firmware \
                 FROM {prefix}motherboard WHERE system_id = ?1"
            ),
            params![system_id],
            |row| {
                Ok(MotherboardRecord {
                    usb_host_controllers: row.get(0)?,
                    pci_devices: row.get(1)?,
                    rtc_present: row.get(2)?,
                    eight_s_code: row.get(3)?,
                    thunderbolt_firmware: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

fn load_tests(conn: &Connection, prefix: &str, system_id: i64) -> Result<Vec<TestOutcome>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT component, name, qualified_name, result_code, passed, start_time, end_time, duration_seconds \
         FROM {prefix}test_results WHERE system_id = ?1 ORDER BY position"
    ))?;
    let rows = stmt
        .query_map(params![system_id], |row| {
            let outcome = TestOutcome {
                component: row.get(0)?,
                name: row.get(1)?,
                qualified_name: row.get(2)?,
                result_code: row.get(3)?,
                passed: row.get::<_, i32>(4)? != 0,
                start_time: None,
                end_time: None,
                duration_seconds: row.get(7)?,
            };
            Ok((
                outcome,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(mut outcome, start, end)| -> Result<TestOutcome> {
            outcome.start_time = string_to_timestamp(start)?;
            outcome.end_time = string_to_timestamp(end)?;
            Ok(outcome)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::generate_schema_sql;
    use chrono::TimeZone;

    fn setup(prefix: &str) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&generate_schema_sql(prefix).unwrap()).unwrap();
        conn
    }

    fn minimal_run(serial: &str) -> DiagnosticRun {
        let mut run = DiagnosticRun::new(&format!("{serial}-2025-08-07-202945.log"), SourceFormat::Text);
        run.system.machine_serial = serial.to_string();
        run.system.serial_source = SerialSource::Filename;
        run
    }

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2025, 8, 7, 20, 29, 45).unwrap();
        let stored = timestamp_to_string(Some(ts));
        assert_eq!(string_to_timestamp(stored).unwrap(), Some(ts));
        assert_eq!(string_to_timestamp(None).unwrap(), None);
        assert!(string_to_timestamp(Some("yesterday".into())).is_err());
    }

    #[test]
    fn test_store_and_load_minimal_run() {
        let conn = setup("t_");
        let run = minimal_run("PF3G44S9");
        let report = store_run(&conn, "t_", &run, WritePolicy::Append).unwrap();
        assert_eq!(report.replaced, 0);

        let loaded = load_run(&conn, "t_", report.system_id).unwrap().unwrap();
        assert_eq!(loaded, run);
    }

    #[test]
    fn test_load_missing_run() {
        let conn = setup("t_");
        assert!(load_run(&conn, "t_", 42).unwrap().is_none());
    }

    #[test]
    fn test_invalid_run_is_rejected() {
        let conn = setup("t_");
        let mut run = minimal_run("PF3G44S9");
        run.summary.total = 3;
        let err = store_run(&conn, "t_", &run, WritePolicy::Append).unwrap_err();
        assert!(matches!(err, SqliteError::ValidationError(_)));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t_system_info", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_upsert_ignores_unknown_serial() {
        let conn = setup("t_");
        let mut run = DiagnosticRun::new("unnamed.log", SourceFormat::Text);
        run.system.machine_serial = UNKNOWN_SERIAL.to_string();

        store_run(&conn, "t_", &run, WritePolicy::Upsert).unwrap();
        let second = store_run(&conn, "t_", &run, WritePolicy::Upsert).unwrap();
        assert_eq!(second.replaced, 0);
    }

    #[test]
    fn test_unknown_stored_status_is_conversion_error() {
        let conn = setup("t_");
        let id = store_run(&conn, "t_", &minimal_run("PF3G44S9"), WritePolicy::Append)
            .unwrap()
            .system_id;
        conn.execute("UPDATE t_system_info SET serial_source = 'guess' WHERE id = ?1", [id])
            .unwrap();
        assert!(matches!(
            load_run(&conn, "t_", id),
            Err(SqliteError::ConversionError(_))
        ));
    }
}
