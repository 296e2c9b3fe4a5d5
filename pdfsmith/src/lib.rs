//! pdfsmith - Shrink PDF files by racing several compression strategies.
//!
//! Each input is handed to three strategies: a lossless structural rewrite,
//! a lossy Ghostscript pass, and the two combined. The smallest candidate
//! that beats the original wins; a file is never made larger.
//!
//! Batches run through a [`ParallelExecutor`](parallel::ParallelExecutor)
//! that isolates every file in its own worker, so one malformed PDF cannot
//! take the batch down.
//!
//! The [`merge`], [`split`] and [`unlock`] modules cover the page tools
//! that sit beside compression.
//!
//! # Examples
//!
//! ## One file
//!
//! ```no_run
//! use pdfsmith::compress::Compressor;
//! use pdfsmith::config::{CompressionConfig, QualityPreset};
//! use std::path::Path;
//!
//! # async fn example() -> pdfsmith::Result<()> {
//! let config = CompressionConfig::new(QualityPreset::Screen);
//! let outcome = Compressor::new().compress(Path::new("scan.pdf"), &config).await?;
//! println!("saved {} bytes", outcome.bytes_saved());
//! # Ok(())
//! # }
//! ```
//!
//! ## A batch
//!
//! ```no_run
//! use pdfsmith::config::CompressionConfig;
//! use pdfsmith::parallel::{ParallelExecutor, WorkerMode};
//! use std::path::PathBuf;
//!
//! # async fn example() {
//! let inputs = vec![PathBuf::from("a.pdf"), PathBuf::from("b.pdf")];
//! let executor = ParallelExecutor::new(WorkerMode::InProcess, 2);
//! let report = executor
//!     .run(&inputs, &CompressionConfig::default(), |_, _| {})
//!     .await;
//! println!("{} bytes saved", report.totals.bytes_saved);
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compress;
pub mod config;
pub mod error;
pub mod io;
pub mod merge;
pub mod output;
pub mod parallel;
pub mod split;
pub mod unlock;
pub mod utils;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

// Re-export commonly used types
pub use config::CompressionConfig;
pub use error::{PdfSmithError, Result};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
