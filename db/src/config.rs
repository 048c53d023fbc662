//! YAML configuration for batch ingestion.
//!
//! Every section is optional; omitted values take their defaults.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! database:
//!   path: diagnostics.db
//!   prefix: lab_
//!   write_policy: upsert
//! ingest:
//!   jobs: 4
//!   extensions: [log, txt, json]
//!   recursive: true
//!   pair_companions: true
//!   header_scan_lines: 20
//! battery:
//!   good: { min_health: 80.0, max_cycles: 500 }
//!   fair: { min_health: 70.0, max_cycles: 800 }
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use selftest_core::BatteryPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result};

/// How a stored run for the same machine serial is treated.
///
/// # Examples
///
/// ```
/// use selftest_db::WritePolicy;
///
/// assert_eq!(WritePolicy::parse("append"), Some(WritePolicy::Append));
/// assert_eq!(WritePolicy::default(), WritePolicy::Upsert);
/// assert_eq!(WritePolicy::Upsert.as_str(), "upsert");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePolicy {
    /// Replace earlier runs of the same serial.
    #[default]
    Upsert,
    /// Keep every run.
    Append,
}

impl WritePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Append => "append",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "upsert" => Some(Self::Upsert),
            "append" => Some(Self::Append),
            _ => None,
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file.
    pub path: Option<String>,
    /// Table name prefix.
    pub prefix: String,
    pub write_policy: WritePolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            prefix: String::new(),
            write_policy: WritePolicy::Upsert,
        }
    }
}

/// File discovery and parsing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Parallel parse jobs; unset picks a default from the CPU count.
    pub jobs: Option<usize>,
    pub extensions: Vec<String>,
    pub recursive: bool,
    pub pair_companions: bool,
    pub header_scan_lines: usize,
    /// Employee number recorded on every ingested run.
    pub operator: Option<String>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            jobs: None,
            extensions: vec!["log".into(), "txt".into(), "json".into()],
            recursive: false,
            pair_companions: true,
            header_scan_lines: 20,
            operator: None,
        }
    }
}

/// Top-level ingest configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Configuration format version.
    pub version: String,
    pub database: DatabaseConfig,
    pub ingest: IngestSettings,
    pub battery: BatteryPolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database: DatabaseConfig::default(),
            ingest: IngestSettings::default(),
            battery: BatteryPolicy::default(),
        }
    }
}

impl IngestConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`YamlError`](crate::DatabaseError::YamlError) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks value ranges and threshold ordering.
    ///
    /// # Examples
    ///
    /// ```
    /// use selftest_db::IngestConfig;
    ///
    /// let mut config = IngestConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.battery.fair.min_health = 90.0;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.ingest.header_scan_lines == 0 {
            return Err(DatabaseError::InvalidConfig(
                "ingest.header_scan_lines must be at least 1".to_string(),
            ));
        }
        if self.ingest.jobs == Some(0) {
            return Err(DatabaseError::InvalidConfig(
                "ingest.jobs must be at least 1 when set".to_string(),
            ));
        }
        if self.ingest.extensions.is_empty() {
            return Err(DatabaseError::InvalidConfig(
                "ingest.extensions cannot be empty".to_string(),
            ));
        }

        let prefix = &self.database.prefix;
        if !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(DatabaseError::InvalidConfig(format!(
                "database.prefix '{prefix}' may only contain ASCII letters, digits and '_'"
            )));
        }

        let (good, fair) = (&self.battery.good, &self.battery.fair);
        for (name, health) in [("good", good.min_health), ("fair", fair.min_health)] {
            if !(0.0..=100.0).contains(&health) {
                return Err(DatabaseError::InvalidConfig(format!(
                    "battery.{name}.min_health {health} is outside 0..=100"
                )));
            }
        }
        if good.min_health < fair.min_health || good.max_cycles > fair.max_cycles {
            return Err(DatabaseError::InvalidConfig(
                "battery.good thresholds must be at least as strict as battery.fair".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
database:
  path: diagnostics.db
  prefix: lab_
  write_policy: append
ingest:
  jobs: 8
  extensions: [log]
  recursive: true
  pair_companions: false
  header_scan_lines: 40
  operator: E1042
battery:
  good: { min_health: 85.0, max_cycles: 400 }
  fair: { min_health: 75.0, max_cycles: 700 }
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: IngestConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.database.path.as_deref(), Some("diagnostics.db"));
        assert_eq!(config.database.prefix, "lab_");
        assert_eq!(config.database.write_policy, WritePolicy::Append);
        assert_eq!(config.ingest.jobs, Some(8));
        assert_eq!(config.ingest.extensions, vec!["log"]);
        assert!(config.ingest.recursive);
        assert!(!config.ingest.pair_companions);
        assert_eq!(config.ingest.header_scan_lines, 40);
        assert_eq!(config.ingest.operator.as_deref(), Some("E1042"));
        assert_eq!(config.battery.good.max_cycles, 400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: IngestConfig = serde_yaml::from_str("database:\n  prefix: t_\n").unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.database.prefix, "t_");
        assert_eq!(config.database.write_policy, WritePolicy::Upsert);
        assert_eq!(config.ingest, IngestSettings::default());
        assert_eq!(config.battery, BatteryPolicy::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = IngestConfig::default();
        config.ingest.header_scan_lines = 0;
        assert!(matches!(config.validate(), Err(DatabaseError::InvalidConfig(_))));

        let mut config = IngestConfig::default();
        config.database.prefix = "bad-prefix".into();
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.battery.good.max_cycles = 900;
        assert!(config.validate().is_err());

        let mut config = IngestConfig::default();
        config.battery.good.min_health = 120.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.yaml");

        let original: IngestConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = IngestConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            IngestConfig::load("/nonexistent/ingest.yaml"),
            Err(DatabaseError::IoError(_))
        ));
    }
}
