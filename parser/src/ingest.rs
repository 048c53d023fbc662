//! Parallel batch ingest.
//!
//! Inputs are expanded into a sorted, de-duplicated file list, paired with
//! their JSON companions, and parsed on a dedicated rayon pool. A failure in
//! one document never aborts the batch; it becomes a failed entry in the
//! [`BatchReport`].

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use selftest_core::{DiagnosticRun, MergeStrategy, reconcile_runs};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assemble::{ParseOptions, parse_document};
use crate::document::SourceDocument;
use crate::error::{ParseError, Result};
use crate::report::BatchReport;

/// Batch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    /// Worker threads; `None` picks a default from the CPU count.
    pub jobs: Option<usize>,
    pub parse: ParseOptions,
    /// Reconcile `X.log` with `X.json` when both are in the batch.
    pub pair_companions: bool,
    /// File extensions picked up from directories (case-insensitive).
    pub extensions: Vec<String>,
    /// Descend into subdirectories.
    pub recursive: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            jobs: None,
            parse: ParseOptions::default(),
            pair_companions: true,
            extensions: vec!["log".into(), "txt".into(), "json".into()],
            recursive: false,
        }
    }
}

/// One successfully parsed input.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestedRun {
    pub path: PathBuf,
    /// Companion export merged into [`run`](Self::run).
    pub merged_with: Option<PathBuf>,
    pub run: DiagnosticRun,
}

/// Parsed runs plus the per-file report.
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub runs: Vec<IngestedRun>,
    pub report: BatchReport,
}

/// Expands files and directories into a sorted list of input files.
///
/// Files named explicitly are kept whatever their extension; directory
/// entries are filtered by `options.extensions`.
///
/// # Errors
///
/// Returns [`ParseError::InvalidInput`] for an empty input list, a path that
/// does not exist, or a set of directories with no matching files.
pub fn collect_input_paths(inputs: &[PathBuf], options: &BatchOptions) -> Result<Vec<PathBuf>> {
    if inputs.is_empty() {
        return Err(ParseError::InvalidInput(
            "No input paths were provided".to_string(),
        ));
    }

    let mut paths = BTreeSet::new();
    for input in inputs {
        if input.is_dir() {
            walk_dir(input, options, &mut paths)?;
            continue;
        }
        if input.is_file() {
            paths.insert(input.clone());
            continue;
        }
        return Err(ParseError::InvalidInput(format!(
            "Input path '{}' does not exist",
            input.display()
        )));
    }

    if paths.is_empty() {
        return Err(ParseError::InvalidInput(
            "No diagnostic files found in the provided paths".to_string(),
        ));
    }
    Ok(paths.into_iter().collect())
}

fn walk_dir(dir: &Path, options: &BatchOptions, paths: &mut BTreeSet<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|source| ParseError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|source| ParseError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            if options.recursive {
                walk_dir(&path, options, paths)?;
            }
        } else if has_extension(&path, &options.extensions) {
            paths.insert(path);
        }
    }
    Ok(())
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Groups paths into parse units: a primary file and, when pairing is on,
/// the JSON export sharing its stem.
fn pair_units(paths: &[PathBuf], pair_companions: bool) -> Vec<(PathBuf, Option<PathBuf>)> {
    if !pair_companions {
        return paths.iter().map(|p| (p.clone(), None)).collect();
    }
    let set: BTreeSet<&PathBuf> = paths.iter().collect();
    let paired: BTreeSet<PathBuf> = paths
        .iter()
        .filter(|p| !is_json(p))
        .map(|p| p.with_extension("json"))
        .filter(|companion| set.contains(companion))
        .collect();

    paths
        .iter()
        .filter(|p| !paired.contains(*p))
        .map(|p| {
            let companion = (!is_json(p))
                .then(|| p.with_extension("json"))
                .filter(|c| paired.contains(c));
            (p.clone(), companion)
        })
        .collect()
}

fn default_parallel_jobs(file_count: usize) -> usize {
    let cpu_count = std::thread::available_parallelism()
        .map(|parallelism| parallelism.get())
        .unwrap_or(4);
    cpu_count.min(12).max(1).min(file_count.max(1))
}

/// Loads and parses one file.
pub fn parse_path(path: &Path, options: &ParseOptions) -> Result<DiagnosticRun> {
    let doc = SourceDocument::load(path)?;
    parse_document(&doc, options)
}

fn parse_unit(
    primary: &Path,
    companion: Option<&Path>,
    options: &ParseOptions,
) -> Result<DiagnosticRun> {
    let run = parse_path(primary, options)?;
    let Some(companion) = companion else {
        return Ok(run);
    };
    match parse_path(companion, options) {
        Ok(export) => Ok(reconcile_runs(&run, &export, MergeStrategy::PreferBase)),
        Err(err) => {
            warn!(path = %companion.display(), error = %err, "companion export not merged");
            let mut run = run;
            run.warnings
                .push(format!("companion '{}' not merged: {err}", companion.display()));
            Ok(run)
        }
    }
}

/// Parses every path, isolating per-file failures.
///
/// Results are ordered by path regardless of scheduling.
pub fn parse_batch(paths: &[PathBuf], options: &BatchOptions) -> BatchResult {
    let units = pair_units(paths, options.pair_companions);
    let jobs = options
        .jobs
        .filter(|jobs| *jobs > 0)
        .unwrap_or_else(|| default_parallel_jobs(units.len()));

    let parse_one = |(primary, companion): &(PathBuf, Option<PathBuf>)| {
        let result = parse_unit(primary, companion.as_deref(), &options.parse);
        (primary.clone(), companion.clone(), result)
    };

    let mut results: Vec<(PathBuf, Option<PathBuf>, Result<DiagnosticRun>)> =
        match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
            Ok(pool) => {
                use rayon::prelude::*;
                pool.install(|| units.par_iter().map(parse_one).collect())
            }
            Err(err) => {
                warn!(error = %err, "thread pool unavailable, parsing sequentially");
                units.iter().map(parse_one).collect()
            }
        };
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut runs = Vec::new();
    let mut report = BatchReport::new();
    for (path, merged_with, result) in results {
        match result {
            Ok(run) => {
                debug!(path = %path.display(), serial = %run.system.machine_serial, "parsed");
                report.record_success(
                    &path,
                    &run.system.machine_serial,
                    merged_with.as_deref(),
                    &run.warnings,
                );
                runs.push(IngestedRun {
                    path,
                    merged_with,
                    run,
                });
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to parse");
                report.record_failure(&path, &err);
            }
        }
    }

    info!(
        files = report.summary.total_files,
        successful = report.summary.successful,
        failed = report.summary.failed,
        jobs,
        "batch parsed"
    );
    BatchResult { runs, report }
}
