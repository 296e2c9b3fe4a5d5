//! Lossless structural optimizer.
//!
//! Rewrites the object layout with lopdf: unused objects are pruned, empty
//! streams dropped, uncompressed streams deflated, objects renumbered, and
//! the result saved with object streams and a cross-reference stream.
//! Rendered content is never touched.

use lopdf::{Document, SaveOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::task;
use tokio::time::timeout;

use super::{CandidateGuard, StrategyResult};

/// Objects packed into one object stream.
const OBJECTS_PER_STREAM: usize = 200;

/// Flate level used for object streams.
const COMPRESSION_LEVEL: u32 = 9;

/// Optimize `input` into `output` within `limit`.
pub async fn optimize(input: &Path, output: &Path, limit: Duration) -> StrategyResult {
    let guard = CandidateGuard::new(output.to_path_buf());
    let abandoned = Arc::new(AtomicBool::new(false));

    let job = {
        let input = input.to_path_buf();
        let output = output.to_path_buf();
        let abandoned = Arc::clone(&abandoned);
        task::spawn_blocking(move || rewrite(&input, &output, &abandoned))
    };

    match timeout(limit, job).await {
        Ok(Ok(Ok(output_size))) => StrategyResult::Success {
            output_path: guard.keep(),
            output_size,
        },
        Ok(Ok(Err(reason))) => StrategyResult::failure(reason),
        Ok(Err(join_err)) => {
            StrategyResult::failure(format!("structural rewrite aborted: {join_err}"))
        }
        Err(_) => {
            abandoned.store(true, Ordering::SeqCst);
            StrategyResult::failure(format!(
                "structural rewrite timed out after {}s",
                limit.as_secs()
            ))
        }
    }
}

/// Blocking part of the rewrite. Returns the candidate size.
fn rewrite(input: &Path, output: &Path, abandoned: &AtomicBool) -> Result<u64, String> {
    let mut doc = Document::load(input).map_err(|e| format!("not a valid PDF: {e}"))?;

    if doc.is_encrypted() {
        return Err("document is encrypted".to_string());
    }

    if doc.get_pages().is_empty() {
        return Err("document has no pages".to_string());
    }

    doc.prune_objects();
    doc.delete_zero_length_streams();
    doc.compress();
    doc.renumber_objects();

    let options = SaveOptions::builder()
        .use_object_streams(true)
        .use_xref_streams(true)
        .max_objects_per_stream(OBJECTS_PER_STREAM)
        .compression_level(COMPRESSION_LEVEL)
        .build();

    let dir = output
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut staged =
        NamedTempFile::new_in(&dir).map_err(|e| format!("cannot stage output: {e}"))?;

    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        doc.save_with_options(&mut writer, options)
            .map_err(|e| format!("failed to save rewritten PDF: {e}"))?;
        writer
            .flush()
            .map_err(|e| format!("failed to flush rewritten PDF: {e}"))?;
    }

    if abandoned.load(Ordering::SeqCst) {
        return Err("abandoned after timeout".to_string());
    }

    staged
        .persist(output)
        .map_err(|e| format!("cannot move candidate into place: {e}"))?;

    std::fs::metadata(output)
        .map(|m| m.len())
        .map_err(|e| format!("cannot stat candidate: {e}"))
}
