//! Batch ingest reporting.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Per-file ingest status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Parsed into a run.
    Success,
    /// Could not be read or parsed.
    Failed,
    /// Left out because its checksum is unchanged since the last ingest.
    Skipped,
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome for one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
    /// Resolved machine serial, when the file parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Companion export reconciled into this file's run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_with: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Aggregate counts for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_files: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// RFC 3339 timestamp of report creation.
    pub processed_at: String,
}

/// Summary plus per-file details for one ingest invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub summary: BatchSummary,
    pub details: Vec<FileReport>,
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            summary: BatchSummary {
                total_files: 0,
                successful: 0,
                failed: 0,
                skipped: 0,
                processed_at: Utc::now().to_rfc3339(),
            },
            details: Vec::new(),
        }
    }

    pub fn record_success(
        &mut self,
        path: &Path,
        serial: &str,
        merged_with: Option<&Path>,
        warnings: &[String],
    ) {
        self.summary.successful += 1;
        self.push(FileReport {
            path: path.display().to_string(),
            status: FileStatus::Success,
            serial: Some(serial.to_string()),
            error: None,
            merged_with: merged_with.map(|p| p.display().to_string()),
            warnings: warnings.to_vec(),
        });
    }

    pub fn record_failure(&mut self, path: &Path, error: impl std::fmt::Display) {
        self.summary.failed += 1;
        self.push(FileReport {
            path: path.display().to_string(),
            status: FileStatus::Failed,
            serial: None,
            error: Some(error.to_string()),
            merged_with: None,
            warnings: Vec::new(),
        });
    }

    pub fn record_skipped(&mut self, path: &Path) {
        self.summary.skipped += 1;
        self.push(FileReport {
            path: path.display().to_string(),
            status: FileStatus::Skipped,
            serial: None,
            error: None,
            merged_with: None,
            warnings: Vec::new(),
        });
    }

    /// Downgrades a successful entry to failed, e.g. when storing its run
    /// was rejected after parsing.
    pub fn mark_failed(&mut self, path: &Path, error: impl std::fmt::Display) {
        let key = path.display().to_string();
        if let Some(entry) = self
            .details
            .iter_mut()
            .find(|d| d.path == key && d.status == FileStatus::Success)
        {
            entry.status = FileStatus::Failed;
            entry.error = Some(error.to_string());
            self.summary.successful -= 1;
            self.summary.failed += 1;
        }
    }

    fn push(&mut self, entry: FileReport) {
        self.summary.total_files += 1;
        self.details.push(entry);
    }
}
