//! Checksum manifest for incremental ingestion.
//!
//! The manifest records, per input file, the SHA-256 digest of the bytes
//! that were last ingested. A file is skipped on the next run when its
//! digest still matches. Entries are keyed by the path string exactly as it
//! was passed to [`Manifest::record`], so callers should use the same path
//! form between runs.
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//! use selftest_db::Manifest;
//!
//! let mut manifest = Manifest::new(env!("CARGO_PKG_VERSION"));
//! let log = Path::new("PF3G44S9-2025-08-07-202945.log");
//! manifest.record(log, Some("PF3G44S9")).unwrap();
//! manifest.save("manifest.json").unwrap();
//!
//! let loaded = Manifest::load("manifest.json").unwrap();
//! assert!(loaded.is_unchanged(log).unwrap());
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;

/// What was recorded for one ingested file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// SHA-256 hex digest of the file bytes.
    pub checksum: String,
    pub size_bytes: u64,
    pub ingested_at: DateTime<Utc>,
    /// Machine serial of the stored run, when one was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
}

/// Per-file ingest state, persisted as pretty-printed JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest format version.
    pub version: String,
    /// Version of the tool that last wrote the manifest.
    pub tool_version: String,
    pub updated_at: DateTime<Utc>,
    /// Entries keyed by path.
    pub files: BTreeMap<String, FileEntry>,
}

impl Manifest {
    /// Creates an empty manifest.
    pub fn new(tool_version: impl Into<String>) -> Self {
        Self {
            version: "1.0".to_string(),
            tool_version: tool_version.into(),
            updated_at: Utc::now(),
            files: BTreeMap::new(),
        }
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, or [`JsonError`](crate::DatabaseError::JsonError) if the
    /// content is not valid manifest JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let manifest = serde_json::from_reader(reader)?;
        Ok(manifest)
    }

    /// Loads `path` if it exists, otherwise starts an empty manifest.
    pub fn load_or_new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new(env!("CARGO_PKG_VERSION")))
        }
    }

    /// Saves the manifest as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Computes the SHA-256 hex digest of a file's contents.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use selftest_db::Manifest;
    ///
    /// let digest = Manifest::calculate_checksum("run.log").unwrap();
    /// assert_eq!(digest.len(), 64);
    /// ```
    pub fn calculate_checksum(path: impl AsRef<Path>) -> Result<String> {
        let bytes = std::fs::read(path)?;
        Ok(format!("{:x}", Sha256::digest(&bytes)))
    }

    /// Returns `true` when `path` has an entry whose checksum matches the
    /// file's current contents.
    ///
    /// A path without an entry is never unchanged.
    pub fn is_unchanged(&self, path: &Path) -> Result<bool> {
        let Some(entry) = self.get(path) else {
            return Ok(false);
        };
        Ok(Self::calculate_checksum(path)? == entry.checksum)
    }

    /// Records the current contents of `path` as ingested.
    pub fn record(&mut self, path: &Path, serial: Option<&str>) -> Result<()> {
        let checksum = Self::calculate_checksum(path)?;
        let size_bytes = std::fs::metadata(path)?.len();
        let now = Utc::now();
        self.files.insert(
            key(path),
            FileEntry {
                checksum,
                size_bytes,
                ingested_at: now,
                serial: serial.map(str::to_string),
            },
        );
        self.updated_at = now;
        Ok(())
    }

    pub fn get(&self, path: &Path) -> Option<&FileEntry> {
        self.files.get(&key(path))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(&key(path))
    }

    pub fn remove(&mut self, path: &Path) -> Option<FileEntry> {
        self.files.remove(&key(path))
    }

    /// Drops entries whose files no longer exist and returns their keys.
    pub fn prune_missing(&mut self) -> Vec<String> {
        let missing: Vec<String> = self
            .files
            .keys()
            .filter(|p| !Path::new(p).exists())
            .cloned()
            .collect();
        for path in &missing {
            self.files.remove(path);
        }
        if !missing.is_empty() {
            self.updated_at = Utc::now();
        }
        missing
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.log");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(
            Manifest::calculate_checksum(&path).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_record_then_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PF3G44S9.log");
        std::fs::write(&path, "SERIAL_NUMBER: PF3G44S9\n").unwrap();

        let mut manifest = Manifest::new("0.1.0");
        assert!(!manifest.is_unchanged(&path).unwrap());

        manifest.record(&path, Some("PF3G44S9")).unwrap();
        assert!(manifest.contains(&path));
        assert!(manifest.is_unchanged(&path).unwrap());

        let entry = manifest.get(&path).unwrap();
        assert_eq!(entry.serial.as_deref(), Some("PF3G44S9"));
        assert_eq!(entry.size_bytes, 24);
    }

    #[test]
    fn test_modified_file_is_changed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("R90ABCDE.log");
        std::fs::write(&path, "CYCLE_COUNT: 120\n").unwrap();

        let mut manifest = Manifest::new("0.1.0");
        manifest.record(&path, None).unwrap();
        std::fs::write(&path, "CYCLE_COUNT: 121\n").unwrap();
        assert!(!manifest.is_unchanged(&path).unwrap());
    }

    #[test]
    fn test_prune_missing() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("a.log");
        let gone = dir.path().join("b.log");
        std::fs::write(&kept, "a").unwrap();
        std::fs::write(&gone, "b").unwrap();

        let mut manifest = Manifest::new("0.1.0");
        manifest.record(&kept, None).unwrap();
        manifest.record(&gone, None).unwrap();
        std::fs::remove_file(&gone).unwrap();

        let pruned = manifest.prune_missing();
        assert_eq!(pruned, vec![gone.to_string_lossy().into_owned()]);
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_load_or_new_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::load_or_new(dir.path().join("manifest.json")).unwrap();
        assert!(manifest.is_empty());
        assert_eq!(manifest.version, "1.0");
    }
}
