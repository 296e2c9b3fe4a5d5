//! Per-file results and the batch report.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::compress::CompressionOutcome;

/// Why a file produced no outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The input could not be read or the result could not be written.
    Input,
    /// The worker crashed, hung, or answered with garbage.
    WorkerFault,
    /// The batch was cancelled before the file finished.
    Cancelled,
}

/// A file that did not produce a [`CompressionOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    /// The input that failed.
    pub input_path: PathBuf,
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable reason.
    pub reason: String,
}

impl FileFailure {
    /// Create a failure record.
    pub fn new(
        input_path: impl Into<PathBuf>,
        kind: FailureKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            kind,
            reason: reason.into(),
        }
    }

    /// Failure record for a file the batch never finished.
    pub fn cancelled(input_path: impl Into<PathBuf>) -> Self {
        Self::new(input_path, FailureKind::Cancelled, "cancelled")
    }
}

/// Result for one input of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileResult {
    /// The file was processed (possibly keeping the original).
    Compressed(CompressionOutcome),
    /// The file could not be processed.
    Failed(FileFailure),
}

impl FileResult {
    /// Input this result belongs to.
    pub fn input_path(&self) -> &Path {
        match self {
            Self::Compressed(outcome) => &outcome.input_path,
            Self::Failed(failure) => &failure.input_path,
        }
    }

    /// The outcome, if the file was processed.
    pub fn outcome(&self) -> Option<&CompressionOutcome> {
        match self {
            Self::Compressed(outcome) => Some(outcome),
            Self::Failed(_) => None,
        }
    }

    /// The failure, if the file was not processed.
    pub fn failure(&self) -> Option<&FileFailure> {
        match self {
            Self::Compressed(_) => None,
            Self::Failed(failure) => Some(failure),
        }
    }
}

/// Aggregate numbers over the processed files of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTotals {
    /// Files that produced an outcome.
    pub files_processed: usize,
    /// Files that did not.
    pub files_failed: usize,
    /// Sum of original sizes of processed files.
    pub original_bytes: u64,
    /// Sum of final sizes of processed files.
    pub final_bytes: u64,
    /// `original_bytes - final_bytes`.
    pub bytes_saved: u64,
}

impl BatchTotals {
    /// Compute totals from per-file results.
    pub fn from_results(results: &[FileResult]) -> Self {
        let mut totals = Self::default();
        for result in results {
            match result {
                FileResult::Compressed(outcome) => {
                    totals.files_processed += 1;
                    totals.original_bytes += outcome.original_size;
                    totals.final_bytes += outcome.final_size;
                }
                FileResult::Failed(_) => totals.files_failed += 1,
            }
        }
        totals.bytes_saved = totals.original_bytes.saturating_sub(totals.final_bytes);
        totals
    }

    /// Overall reduction as a whole percentage.
    pub fn reduction_percent(&self) -> u64 {
        if self.original_bytes == 0 {
            0
        } else {
            self.bytes_saved * 100 / self.original_bytes
        }
    }
}

/// Everything a batch run produced. `results` follows input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One entry per input, in input order.
    pub results: Vec<FileResult>,
    /// Aggregates over `results`.
    pub totals: BatchTotals,
    /// Wall-clock time of the run.
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Whether the run was cut short.
    pub cancelled: bool,
}

impl BatchReport {
    /// Build a report, computing totals from `results`.
    pub fn new(results: Vec<FileResult>, elapsed: Duration, cancelled: bool) -> Self {
        let totals = BatchTotals::from_results(&results);
        Self {
            results,
            totals,
            elapsed,
            cancelled,
        }
    }

    /// Failures in input order.
    pub fn failures(&self) -> impl Iterator<Item = &FileFailure> {
        self.results.iter().filter_map(FileResult::failure)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
