//! PDF compression strategies and the orchestrator that picks among them.
//!
//! Every strategy turns one input PDF into one candidate file inside a
//! scratch directory. The [`Compressor`] runs them all, keeps the smallest
//! candidate that beats the original, and performs the final write.
//!
//! # Examples
//!
//! ```no_run
//! use pdfsmith::compress::Compressor;
//! use pdfsmith::config::CompressionConfig;
//! use std::path::Path;
//!
//! # async fn example() -> pdfsmith::Result<()> {
//! let config = CompressionConfig::default();
//! let outcome = Compressor::new().compress(Path::new("report.pdf"), &config).await?;
//! println!("{} -> {} bytes", outcome.original_size, outcome.final_size);
//! # Ok(())
//! # }
//! ```

pub mod combined;
pub mod ghostscript;
pub mod orchestrator;
pub mod structural;

pub use ghostscript::Ghostscript;
pub use orchestrator::{CompressionOutcome, Compressor, select_best};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::CompressionConfig;

/// The fixed set of compression strategies.
///
/// Declaration order is the tie-break priority: when two candidates have the
/// same size, the earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Lossless rewrite of the object layout with lopdf.
    Structural,
    /// Lossy rewrite through Ghostscript.
    ExternalLossy,
    /// Ghostscript followed by the structural rewrite.
    Combined,
}

impl StrategyKind {
    /// All strategies in priority order.
    pub const ALL: [StrategyKind; 3] = [Self::Structural, Self::ExternalLossy, Self::Combined];

    /// Stable strategy name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::ExternalLossy => "external-lossy",
            Self::Combined => "combined",
        }
    }

    /// Strategy-private candidate path inside a scratch directory.
    pub fn candidate_path(&self, scratch: &Path) -> PathBuf {
        scratch.join(format!("{}.pdf", self.name()))
    }

    /// Run this strategy on one input.
    ///
    /// Never fails: every problem is reported as [`StrategyResult::Failure`].
    pub async fn attempt(
        &self,
        input: &Path,
        scratch: &Path,
        config: &CompressionConfig,
    ) -> StrategyResult {
        let output = self.candidate_path(scratch);

        log::debug!("{}: trying {} -> {}", self, input.display(), output.display());

        let result = match self {
            Self::Structural => structural::optimize(input, &output, config.timeout).await,
            Self::ExternalLossy => {
                Ghostscript::from_config(config)
                    .compress(input, &output, config.quality)
                    .await
            }
            Self::Combined => combined::compress(input, scratch, &output, config).await,
        };

        match &result {
            StrategyResult::Success { output_size, .. } => {
                log::debug!("{}: produced {} bytes", self, output_size)
            }
            StrategyResult::Failure { reason } => log::debug!("{}: failed: {}", self, reason),
        }

        result
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one strategy attempt on one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StrategyResult {
    /// A candidate was written.
    Success {
        /// Where the candidate lives.
        output_path: PathBuf,
        /// Candidate size in bytes (may exceed the original).
        output_size: u64,
    },
    /// No usable candidate; nothing was left on disk.
    Failure {
        /// Why the strategy failed.
        reason: String,
    },
}

impl StrategyResult {
    /// Create a Failure result.
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    /// Check whether a candidate was produced.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Size of the candidate, if any.
    pub fn output_size(&self) -> Option<u64> {
        match self {
            Self::Success { output_size, .. } => Some(*output_size),
            Self::Failure { .. } => None,
        }
    }

    /// Path of the candidate, if any.
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            Self::Success { output_path, .. } => Some(output_path),
            Self::Failure { .. } => None,
        }
    }
}

/// A strategy paired with what it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    /// Which strategy ran.
    pub strategy: StrategyKind,
    /// What it produced.
    pub result: StrategyResult,
}

/// A file that is deleted when dropped unless [`kept`](CandidateGuard::keep).
///
/// Held across every exit path of a strategy so that partial output never
/// outlives a failure, a timeout, or a cancelled future.
#[derive(Debug)]
pub(crate) struct CandidateGuard {
    path: PathBuf,
    armed: bool,
}

impl CandidateGuard {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file and hand back its path.
    pub(crate) fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for CandidateGuard {
    fn drop(&mut self) {
        if self.armed {
            match std::fs::remove_file(&self.path) {
                Ok(()) => log::trace!("removed {}", self.path.display()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => log::warn!("could not remove {}: {}", self.path.display(), err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_strategy_priority_order() {
        assert!(StrategyKind::Structural < StrategyKind::ExternalLossy);
        assert!(StrategyKind::ExternalLossy < StrategyKind::Combined);
        assert_eq!(StrategyKind::ALL.len(), 3);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(StrategyKind::Structural.to_string(), "structural");
        assert_eq!(StrategyKind::ExternalLossy.to_string(), "external-lossy");
        assert_eq!(StrategyKind::Combined.to_string(), "combined");
        assert_eq!(
            serde_json::to_string(&StrategyKind::ExternalLossy).unwrap(),
            "\"external-lossy\""
        );
    }

    #[test]
    fn test_candidate_paths_are_distinct() {
        let scratch = Path::new("/scratch");
        let mut paths: Vec<_> = StrategyKind::ALL
            .iter()
            .map(|kind| kind.candidate_path(scratch))
            .collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), StrategyKind::ALL.len());
    }

    #[test]
    fn test_guard_removes_file_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.pdf");
        std::fs::write(&path, b"partial").unwrap();

        drop(CandidateGuard::new(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn test_guard_keep_leaves_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("done.pdf");
        std::fs::write(&path, b"done").unwrap();

        let kept = CandidateGuard::new(path.clone()).keep();
        assert_eq!(kept, path);
        assert!(path.exists());
    }

    #[test]
    fn test_guard_tolerates_missing_file() {
        let dir = TempDir::new().unwrap();
        drop(CandidateGuard::new(dir.path().join("never-written.pdf")));
    }

    #[test]
    fn test_result_accessors() {
        let ok = StrategyResult::Success {
            output_path: PathBuf::from("x.pdf"),
            output_size: 42,
        };
        assert!(ok.is_success());
        assert_eq!(ok.output_size(), Some(42));
        assert_eq!(ok.output_path(), Some(Path::new("x.pdf")));

        let failed = StrategyResult::failure("boom");
        assert!(!failed.is_success());
        assert_eq!(failed.output_size(), None);
        assert_eq!(failed.output_path(), None);
    }
}
