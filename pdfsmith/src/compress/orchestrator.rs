//! Runs every strategy on one input and keeps the best candidate.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::{StrategyAttempt, StrategyKind, StrategyResult};
use crate::config::CompressionConfig;
use crate::error::{PdfSmithError, Result};
use crate::io::replace_atomically;

/// Outcome of compressing one input.
///
/// `final_size <= original_size` always holds. When no candidate is strictly
/// smaller, `chosen_strategy` is `None` and the result is the original bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionOutcome {
    /// The input that was compressed.
    pub input_path: PathBuf,

    /// Input size in bytes.
    pub original_size: u64,

    /// Winning strategy, or `None` when the original was kept.
    pub chosen_strategy: Option<StrategyKind>,

    /// Size of the result in bytes.
    pub final_size: u64,

    /// Where the result lives (or would live, for a dry run).
    pub final_path: PathBuf,

    /// Whether anything was written to `final_path`.
    pub written: bool,

    /// Every strategy attempt, in priority order.
    pub attempts: Vec<StrategyAttempt>,
}

impl CompressionOutcome {
    /// Check whether the file got smaller.
    pub fn improved(&self) -> bool {
        self.final_size < self.original_size
    }

    /// Bytes removed from the input.
    pub fn bytes_saved(&self) -> u64 {
        self.original_size.saturating_sub(self.final_size)
    }

    /// Size reduction as a whole percentage (0 to 100).
    pub fn reduction_percent(&self) -> u64 {
        if self.original_size == 0 {
            return 0;
        }
        self.bytes_saved() * 100 / self.original_size
    }

    /// Name of the winning strategy, or `"none"`.
    pub fn strategy_name(&self) -> &'static str {
        self.chosen_strategy.map_or("none", |kind| kind.name())
    }
}

/// Pick the smallest successful candidate that beats `original_size`.
///
/// Equal sizes are resolved by strategy priority, so the choice does not
/// depend on the order in which attempts finished.
pub fn select_best(original_size: u64, attempts: &[StrategyAttempt]) -> Option<&StrategyAttempt> {
    attempts
        .iter()
        .filter_map(|attempt| {
            attempt
                .result
                .output_size()
                .map(|size| (size, attempt.strategy, attempt))
        })
        .filter(|(size, _, _)| *size < original_size)
        .min_by_key(|(size, strategy, _)| (*size, *strategy))
        .map(|(_, _, attempt)| attempt)
}

/// Strategy orchestrator.
#[derive(Debug, Clone)]
pub struct Compressor {
    strategies: Vec<StrategyKind>,
}

impl Compressor {
    /// Create an orchestrator running every strategy.
    pub fn new() -> Self {
        Self {
            strategies: StrategyKind::ALL.to_vec(),
        }
    }

    /// Create an orchestrator running only the given strategies.
    pub fn with_strategies(strategies: impl IntoIterator<Item = StrategyKind>) -> Self {
        let mut strategies: Vec<_> = strategies.into_iter().collect();
        strategies.sort();
        strategies.dedup();
        Self { strategies }
    }

    /// Strategies this orchestrator runs, in priority order.
    pub fn strategies(&self) -> &[StrategyKind] {
        &self.strategies
    }

    /// Compress one input using a private scratch directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be read or the final write
    /// fails. Strategy failures are not errors.
    pub async fn compress(
        &self,
        input: &Path,
        config: &CompressionConfig,
    ) -> Result<CompressionOutcome> {
        let scratch = scratch_dir()?;
        self.compress_in(input, scratch.path(), config).await
    }

    /// Compress one input using a scratch directory owned by the caller.
    ///
    /// All candidates are removed from `scratch` before returning.
    pub async fn compress_in(
        &self,
        input: &Path,
        scratch: &Path,
        config: &CompressionConfig,
    ) -> Result<CompressionOutcome> {
        let metadata = tokio::fs::metadata(input)
            .await
            .map_err(|e| PdfSmithError::from_input_io(input.to_path_buf(), e))?;
        if !metadata.is_file() {
            return Err(PdfSmithError::not_a_file(input.to_path_buf()));
        }
        let original_size = metadata.len();

        let attempts: Vec<StrategyAttempt> = join_all(self.strategies.iter().map(|kind| async move {
            StrategyAttempt {
                strategy: *kind,
                result: kind.attempt(input, scratch, config).await,
            }
        }))
        .await;

        let best = select_best(original_size, &attempts).and_then(|attempt| match &attempt.result {
            StrategyResult::Success {
                output_path,
                output_size,
            } => Some((attempt.strategy, output_path.as_path(), *output_size)),
            StrategyResult::Failure { .. } => None,
        });
        let destination = config.destination(input);

        let committed = match best {
            Some((strategy, candidate, size)) => {
                let written = if config.dry_run {
                    false
                } else {
                    replace_atomically(candidate, &destination, input).await?;
                    true
                };

                Committed {
                    chosen: Some(strategy),
                    final_size: size,
                    final_path: destination,
                    written,
                }
            }
            None if !config.dry_run && destination != input => {
                replace_atomically(input, &destination, input).await?;
                Committed {
                    chosen: None,
                    final_size: original_size,
                    final_path: destination,
                    written: true,
                }
            }
            None => Committed {
                chosen: None,
                final_size: original_size,
                final_path: input.to_path_buf(),
                written: false,
            },
        };

        discard_candidates(&attempts).await;

        log::info!(
            "{}: {} -> {} bytes via {}",
            input.display(),
            original_size,
            committed.final_size,
            committed.chosen.map_or("none", |kind| kind.name())
        );

        Ok(CompressionOutcome {
            input_path: input.to_path_buf(),
            original_size,
            chosen_strategy: committed.chosen,
            final_size: committed.final_size,
            final_path: committed.final_path,
            written: committed.written,
            attempts,
        })
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new()
    }
}

struct Committed {
    chosen: Option<StrategyKind>,
    final_size: u64,
    final_path: PathBuf,
    written: bool,
}

/// Create a private scratch directory for one file's candidates.
pub(crate) fn scratch_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("pdfsmith-")
        .tempdir()
        .map_err(PdfSmithError::from)
}

async fn discard_candidates(attempts: &[StrategyAttempt]) {
    for path in attempts.iter().filter_map(|a| a.result.output_path()) {
        if let Err(err) = tokio::fs::remove_file(path).await
            && err.kind() != std::io::ErrorKind::NotFound
        {
            log::warn!("could not remove candidate {}: {}", path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::StrategyKind::{Combined, ExternalLossy, Structural};
    use crate::config::OutputRouting;
    use crate::test_support::{write_corrupt_pdf, write_test_pdf};
    use rstest::rstest;
    use std::time::Duration;
    use tempfile::TempDir;

    fn success(strategy: StrategyKind, size: u64) -> StrategyAttempt {
        StrategyAttempt {
            strategy,
            result: StrategyResult::Success {
                output_path: PathBuf::from(format!("{}.pdf", strategy.name())),
                output_size: size,
            },
        }
    }

    fn failure(strategy: StrategyKind) -> StrategyAttempt {
        StrategyAttempt {
            strategy,
            result: StrategyResult::failure("nope"),
        }
    }

    fn structural_only(dry_run: bool, output: OutputRouting) -> CompressionConfig {
        CompressionConfig {
            dry_run,
            output,
            timeout: Duration::from_secs(60),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_only_lossy_succeeds() {
        // a.pdf: 500000 bytes, only the lossy optimizer succeeds.
        let attempts = vec![
            failure(StrategyKind::Structural),
            success(StrategyKind::ExternalLossy, 120_000),
            failure(StrategyKind::Combined),
        ];

        let best = select_best(500_000, &attempts).unwrap();
        assert_eq!(best.strategy, StrategyKind::ExternalLossy);
        assert_eq!(best.result.output_size(), Some(120_000));
    }

    #[test]
    fn test_select_keeps_original_when_nothing_smaller() {
        // b.pdf: 10000 bytes, every candidate is at least as large.
        let attempts = vec![
            success(StrategyKind::Structural, 10_000),
            success(StrategyKind::ExternalLossy, 14_000),
            success(StrategyKind::Combined, 10_001),
        ];

        assert!(select_best(10_000, &attempts).is_none());
    }

    #[test]
    fn test_select_all_failed() {
        let attempts: Vec<_> = StrategyKind::ALL.iter().map(|k| failure(*k)).collect();
        assert!(select_best(1_000, &attempts).is_none());
    }

    #[rstest]
    #[case(&[(Combined, 500), (ExternalLossy, 500)], ExternalLossy)]
    #[case(&[(Combined, 500), (Structural, 500)], Structural)]
    #[case(&[(Combined, 400), (Structural, 500)], Combined)]
    #[case(&[(ExternalLossy, 500), (Structural, 500), (Combined, 500)], Structural)]
    fn test_select_tie_break(
        #[case] candidates: &[(StrategyKind, u64)],
        #[case] expected: StrategyKind,
    ) {
        let attempts: Vec<_> = candidates
            .iter()
            .map(|&(kind, size)| success(kind, size))
            .collect();

        assert_eq!(select_best(1_000, &attempts).unwrap().strategy, expected);
    }

    #[test]
    fn test_outcome_helpers() {
        let outcome = CompressionOutcome {
            input_path: PathBuf::from("a.pdf"),
            original_size: 500_000,
            chosen_strategy: Some(StrategyKind::ExternalLossy),
            final_size: 120_000,
            final_path: PathBuf::from("a.compressed.pdf"),
            written: true,
            attempts: vec![],
        };
        assert!(outcome.improved());
        assert_eq!(outcome.bytes_saved(), 380_000);
        assert_eq!(outcome.reduction_percent(), 76);
        assert_eq!(outcome.strategy_name(), "external-lossy");
    }

    #[tokio::test]
    async fn test_compress_writes_smaller_result() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "doc.pdf", 3);
        let before = std::fs::read(&input).unwrap();
        let config = structural_only(false, OutputRouting::Suffixed);

        let outcome = Compressor::with_strategies([StrategyKind::Structural])
            .compress(&input, &config)
            .await
            .unwrap();

        assert_eq!(outcome.chosen_strategy, Some(StrategyKind::Structural));
        assert!(outcome.final_size < outcome.original_size);
        assert!(outcome.written);
        assert_eq!(outcome.final_path, dir.path().join("doc.compressed.pdf"));
        assert_eq!(
            std::fs::metadata(&outcome.final_path).unwrap().len(),
            outcome.final_size
        );
        assert_eq!(std::fs::read(&input).unwrap(), before);
    }

    #[tokio::test]
    async fn test_compress_corrupt_input_keeps_exact_bytes() {
        let dir = TempDir::new().unwrap();
        let input = write_corrupt_pdf(dir.path(), "broken.pdf");
        let before = std::fs::read(&input).unwrap();
        let config = structural_only(false, OutputRouting::Suffixed);

        let outcome = Compressor::with_strategies([StrategyKind::Structural])
            .compress(&input, &config)
            .await
            .unwrap();

        assert_eq!(outcome.chosen_strategy, None);
        assert_eq!(outcome.final_size, outcome.original_size);
        assert!(!outcome.attempts[0].result.is_success());
        assert_eq!(std::fs::read(&outcome.final_path).unwrap(), before);
    }

    #[tokio::test]
    async fn test_compress_in_place_without_improvement_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let input = write_corrupt_pdf(dir.path(), "broken.pdf");
        let config = structural_only(false, OutputRouting::InPlace);

        let outcome = Compressor::with_strategies([StrategyKind::Structural])
            .compress(&input, &config)
            .await
            .unwrap();

        assert_eq!(outcome.final_path, input);
        assert!(!outcome.written);
    }

    #[tokio::test]
    async fn test_compress_in_place_replaces_input() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "doc.pdf", 2);
        let original = std::fs::metadata(&input).unwrap().len();
        let config = structural_only(false, OutputRouting::InPlace);

        let outcome = Compressor::with_strategies([StrategyKind::Structural])
            .compress(&input, &config)
            .await
            .unwrap();

        assert_eq!(outcome.final_path, input);
        assert!(std::fs::metadata(&input).unwrap().len() < original);
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "no temporary files may leak next to the output");
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing_and_matches_real_run() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "doc.pdf", 2);
        let compressor = Compressor::with_strategies([StrategyKind::Structural]);

        let dry = compressor
            .compress(&input, &structural_only(true, OutputRouting::Suffixed))
            .await
            .unwrap();
        let destination = dir.path().join("doc.compressed.pdf");
        assert!(!dry.written);
        assert!(!destination.exists());

        let real = compressor
            .compress(&input, &structural_only(false, OutputRouting::Suffixed))
            .await
            .unwrap();
        assert_eq!(real.chosen_strategy, dry.chosen_strategy);
        assert_eq!(real.final_size, dry.final_size);
        assert!(destination.exists());
    }

    #[tokio::test]
    async fn test_compress_is_idempotent_on_own_output() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "doc.pdf", 3);
        let compressor = Compressor::with_strategies([StrategyKind::Structural]);
        let config = structural_only(false, OutputRouting::Suffixed);

        let first = compressor.compress(&input, &config).await.unwrap();
        let second = compressor.compress(&first.final_path, &config).await.unwrap();

        // A second pass may shave a little more, never a meaningful amount.
        assert!(second.final_size <= first.final_size);
        assert!(second.bytes_saved() * 20 <= first.final_size);
    }

    #[tokio::test]
    async fn test_compress_removes_candidates_from_scratch() {
        let dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "doc.pdf", 1);

        Compressor::with_strategies([StrategyKind::Structural])
            .compress_in(
                &input,
                scratch.path(),
                &structural_only(true, OutputRouting::Suffixed),
            )
            .await
            .unwrap();

        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_compress_missing_input_is_error() {
        let dir = TempDir::new().unwrap();
        let result = Compressor::new()
            .compress(&dir.path().join("nope.pdf"), &CompressionConfig::default())
            .await;

        assert!(matches!(result, Err(PdfSmithError::FileNotFound { .. })));
    }

    #[tokio::test]
    async fn test_compress_directory_input_is_error() {
        let dir = TempDir::new().unwrap();
        let result = Compressor::new()
            .compress(dir.path(), &CompressionConfig::default())
            .await;

        assert!(matches!(result, Err(PdfSmithError::NotAFile { .. })));
    }

    #[test]
    fn test_with_strategies_sorts_and_dedups() {
        let compressor = Compressor::with_strategies([
            StrategyKind::Combined,
            StrategyKind::Structural,
            StrategyKind::Combined,
        ]);
        assert_eq!(
            compressor.strategies(),
            &[StrategyKind::Structural, StrategyKind::Combined]
        );
    }
}
