//! Ingest configuration and change tracking.
//!
//! [`IngestConfig`] is the typed YAML configuration for batch ingestion:
//! where runs are stored, how existing runs are treated ([`WritePolicy`]),
//! which files are picked up, and the battery scoring thresholds.
//!
//! [`Manifest`] records a SHA-256 checksum per ingested file so repeated
//! ingests can skip files that have not changed.
//!
//! # Quick start
//!
//! ```no_run
//! use selftest_db::{IngestConfig, Manifest};
//!
//! let config = IngestConfig::load("ingest.yaml").unwrap();
//! config.validate().unwrap();
//!
//! let mut manifest = Manifest::load_or_new("manifest.json").unwrap();
//! let path = std::path::Path::new("logs/PF3G44S9-2025-08-07-202945.log");
//! if !manifest.is_unchanged(path).unwrap() {
//!     // parse and store, then:
//!     manifest.record(path, Some("PF3G44S9")).unwrap();
//! }
//! manifest.save("manifest.json").unwrap();
//! ```

mod config;
mod error;
mod manifest;

pub use config::{DatabaseConfig, IngestConfig, IngestSettings, WritePolicy};
pub use error::{DatabaseError, Result};
pub use manifest::{FileEntry, Manifest};
