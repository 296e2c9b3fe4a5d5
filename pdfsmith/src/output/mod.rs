//! User-facing output for pdfsmith.
//!
//! Human-readable lines per file, a closing summary, and a machine-readable
//! JSON rendering of the whole [`BatchReport`].
//!
//! # Examples
//!
//! ```no_run
//! use pdfsmith::output::OutputFormatter;
//!
//! let formatter = OutputFormatter::new(false, false);
//! formatter.info("Compressing 2 files");
//! formatter.success("a.pdf: 1.20 MB → 310.00 KB");
//! ```

pub mod formatter;

pub use formatter::{MessageLevel, OutputFormatter};

use crate::error::Result;
use crate::parallel::BatchReport;

/// Render a batch report as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn report_json(report: &BatchReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::{FileFailure, FileResult};
    use std::time::Duration;

    #[test]
    fn test_report_json_is_parseable() {
        let report = BatchReport::new(
            vec![FileResult::Failed(FileFailure::cancelled("a.pdf"))],
            Duration::from_secs(1),
            true,
        );

        let json = report_json(&report).unwrap();
        let back: BatchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
