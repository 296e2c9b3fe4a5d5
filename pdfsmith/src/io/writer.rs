//! Atomic output writes.
//!
//! Every write goes to a staging file next to the destination and is then
//! renamed over it, so a destination is never seen half-written. Staging
//! files are named `.<destination name>.pdfsmith-XXXXXX.tmp`; a writer that
//! is killed before the rename leaves one behind, and [`remove_staged`]
//! deletes them.

use lopdf::Document;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::task;

use crate::error::{PdfSmithError, Result};

const STAGING_SUFFIX: &str = ".tmp";

/// File name prefix of every staging file for `destination`.
pub fn staging_prefix(destination: &Path) -> String {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!(".{name}.pdfsmith-")
}

fn parent_dir(destination: &Path) -> PathBuf {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn staging_file(destination: &Path) -> std::io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(&staging_prefix(destination))
        .suffix(STAGING_SUFFIX)
        .tempfile_in(parent_dir(destination))
}

/// Copy `source` over `destination` through a staging file and a rename.
/// Permissions follow `permissions_from`.
///
/// # Errors
///
/// Returns [`PdfSmithError::FailedToWrite`] if any step fails; the
/// destination is then untouched.
pub async fn replace_atomically(
    source: &Path,
    destination: &Path,
    permissions_from: &Path,
) -> Result<()> {
    let source = source.to_path_buf();
    let destination = destination.to_path_buf();
    let permissions_from = permissions_from.to_path_buf();

    task::spawn_blocking(move || -> Result<()> {
        let fail = |source: std::io::Error| PdfSmithError::FailedToWrite {
            path: destination.clone(),
            source,
        };

        let mut staged = staging_file(&destination).map_err(fail)?;
        let mut reader = std::fs::File::open(&source).map_err(fail)?;
        std::io::copy(&mut reader, staged.as_file_mut()).map_err(fail)?;
        staged.as_file_mut().flush().map_err(fail)?;

        if let Ok(meta) = std::fs::metadata(&permissions_from) {
            std::fs::set_permissions(staged.path(), meta.permissions()).map_err(fail)?;
        }

        staged.persist(&destination).map_err(|e| fail(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| PdfSmithError::other(format!("Write task failed: {e}")))?
}

/// Save `doc` to `destination` through a staging file and a rename.
///
/// Returns the size of the written file.
///
/// # Errors
///
/// Returns [`PdfSmithError::FailedToWrite`] if serializing or renaming fails.
pub async fn save_document(mut doc: Document, destination: &Path) -> Result<u64> {
    let destination = destination.to_path_buf();

    task::spawn_blocking(move || -> Result<u64> {
        let fail = |source: std::io::Error| PdfSmithError::FailedToWrite {
            path: destination.clone(),
            source,
        };

        let mut staged = staging_file(&destination).map_err(fail)?;
        {
            let mut writer = std::io::BufWriter::new(staged.as_file_mut());
            doc.save_to(&mut writer).map_err(|e| fail(std::io::Error::other(e)))?;
            writer.flush().map_err(fail)?;
        }

        let file = staged.persist(&destination).map_err(|e| fail(e.error))?;
        let size = file.metadata().map_err(fail)?.len();
        log::debug!("wrote {} ({} bytes)", destination.display(), size);
        Ok(size)
    })
    .await
    .map_err(|e| PdfSmithError::other(format!("Write task failed: {e}")))?
}

/// Delete staging files left next to `destination` by an interrupted write.
///
/// Returns how many were removed.
pub fn remove_staged(destination: &Path) -> usize {
    let prefix = staging_prefix(destination);
    let Ok(entries) = std::fs::read_dir(parent_dir(destination)) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !(name.starts_with(&prefix) && name.ends_with(STAGING_SUFFIX)) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                log::debug!("removed stale staging file {}", entry.path().display());
                removed += 1;
            }
            Err(err) => log::warn!("could not remove {}: {}", entry.path().display(), err),
        }
    }
    removed
}
