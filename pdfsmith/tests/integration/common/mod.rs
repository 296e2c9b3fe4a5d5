//! Shared fixtures for the integration tests.
//!
//! The PDF generators are the library's own test fixtures, compiled into
//! this test crate.

use pdfsmith::config::{CompressionConfig, OutputRouting};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[allow(dead_code)]
#[path = "../../../src/test_support.rs"]
mod fixtures;

pub use fixtures::write_test_pdf as write_pdf;
pub use fixtures::{page_count, page_labels, write_corrupt_pdf, write_encrypted_pdf};

/// Write an executable script named `fake-gs` standing in for Ghostscript.
/// `body` sees the output path as `$out` and the input path as `$in`.
#[cfg(unix)]
pub fn fake_ghostscript(dir: &Path, body: &str) -> PathBuf {
    fixtures::fake_ghostscript(dir, "fake-gs", body)
}

/// Configuration for tests: short timeouts and the given Ghostscript.
pub fn test_config(
    ghostscript: &Path,
    output: OutputRouting,
    dry_run: bool,
) -> CompressionConfig {
    CompressionConfig {
        dry_run,
        output,
        ghostscript: ghostscript.to_path_buf(),
        timeout: Duration::from_secs(60),
        ..Default::default()
    }
}

/// File size in bytes.
pub fn size_of(path: &Path) -> u64 {
    std::fs::metadata(path).expect("stat").len()
}

/// Names of the entries in a directory, sorted.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
