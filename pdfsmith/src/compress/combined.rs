//! Two-stage strategy: Ghostscript for image reduction, then the structural
//! rewrite on Ghostscript's output.
//!
//! There is no partial credit. If either stage fails the strategy fails,
//! even when stage one produced a usable file; that file is already
//! available as the standalone `external-lossy` candidate.

use std::path::Path;

use super::{CandidateGuard, Ghostscript, StrategyResult, structural};
use crate::config::CompressionConfig;

/// File name of the intermediate stage-one output inside the scratch dir.
pub const STAGE_ONE_FILE: &str = "combined-stage1.pdf";

/// Run both stages, writing the final candidate to `output`.
pub async fn compress(
    input: &Path,
    scratch: &Path,
    output: &Path,
    config: &CompressionConfig,
) -> StrategyResult {
    let stage = CandidateGuard::new(scratch.join(STAGE_ONE_FILE));

    let first = Ghostscript::from_config(config)
        .compress(input, stage.path(), config.quality)
        .await;
    if let StrategyResult::Failure { reason } = first {
        return StrategyResult::failure(format!("lossy stage failed: {reason}"));
    }

    match structural::optimize(stage.path(), output, config.timeout).await {
        StrategyResult::Failure { reason } => {
            StrategyResult::failure(format!("structural stage failed: {reason}"))
        }
        success => success,
    }
}
