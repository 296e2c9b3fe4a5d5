use futures::future::try_join_all;
use lopdf::{Document, Object, ObjectId};
use std::path::{Path, PathBuf};
use tokio::task;

use crate::error::{PdfSmithError, Result};
use crate::io::{load_document, save_document};

/// Default destination of an ungrouped merge: `merged.pdf` next to the
/// first input.
pub fn default_merge_output(first_input: &Path) -> PathBuf {
    first_input
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join("merged.pdf")
}

/// Result of a completed merge.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Inputs in the order their pages appear.
    pub inputs: Vec<PathBuf>,
    /// File written.
    pub output_path: PathBuf,
    /// Pages in the merged document.
    pub page_count: usize,
    /// Size of the written file.
    pub output_size: u64,
}

/// Merges PDF documents page tree by page tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct Merger;

impl Merger {
    /// Create a merger.
    pub fn new() -> Self {
        Self
    }

    /// Merge `inputs`, in order, into `output`.
    ///
    /// Inputs are loaded concurrently. An input that needs a password fails
    /// the merge.
    ///
    /// # Errors
    ///
    /// Returns an error if `inputs` is empty, any input cannot be loaded,
    /// a page tree is malformed, or the output cannot be written.
    pub async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<MergeOutcome> {
        if inputs.is_empty() {
            return Err(PdfSmithError::merge_failed("No input files"));
        }

        let documents = try_join_all(inputs.iter().map(|path| load_document(path))).await?;
        let merged = task::spawn_blocking(move || merge_documents(documents))
            .await
            .map_err(|e| PdfSmithError::other(format!("Merge task failed: {e}")))??;

        let page_count = merged.get_pages().len();
        let output_size = save_document(merged, output).await?;

        log::info!(
            "merged {} files ({} pages) into {}",
            inputs.len(),
            page_count,
            output.display()
        );
        Ok(MergeOutcome {
            inputs: inputs.to_vec(),
            output_path: output.to_path_buf(),
            page_count,
            output_size,
        })
    }
}

/// Merge loaded documents into the first one.
///
/// Each later document is renumbered past the merged document's highest
/// object id and its root page tree node is hung under the merged root, so
/// attributes it passes down to its pages (resources, media box) still
/// apply. Objects no longer reachable, such as the later catalogs, are
/// pruned.
///
/// # Errors
///
/// Returns [`PdfSmithError::MergeFailed`] if `documents` is empty or a
/// document has no usable page tree.
pub fn merge_documents(documents: Vec<Document>) -> Result<Document> {
    let mut documents = documents.into_iter();
    let mut merged = documents
        .next()
        .ok_or_else(|| PdfSmithError::merge_failed("No input files"))?;
    let root_pages = page_tree_root(&merged, 1)?;

    for (idx, mut doc) in documents.enumerate() {
        let position = idx + 2;
        doc.renumber_objects_with(merged.max_id + 1);

        let subtree = page_tree_root(&doc, position)?;
        let page_count = doc.get_pages().len();
        if version_number(&doc.version) > version_number(&merged.version) {
            merged.version = doc.version.clone();
        }

        merged.max_id = merged.max_id.max(doc.max_id);
        merged.objects.extend(doc.objects);
        attach_subtree(&mut merged, root_pages, subtree, page_count)?;

        log::debug!("document {position}: {page_count} pages attached");
    }

    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();
    Ok(merged)
}

fn page_tree_root(doc: &Document, position: usize) -> Result<ObjectId> {
    doc.catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| {
            PdfSmithError::merge_failed(format!("Document {position} has no page tree: {e}"))
        })
}

fn attach_subtree(
    merged: &mut Document,
    root: ObjectId,
    subtree: ObjectId,
    page_count: usize,
) -> Result<()> {
    let malformed =
        |e: lopdf::Error| PdfSmithError::merge_failed(format!("Malformed page tree: {e}"));

    merged
        .get_dictionary_mut(subtree)
        .map_err(malformed)?
        .set("Parent", Object::Reference(root));

    let root_dict = merged.get_dictionary_mut(root).map_err(malformed)?;
    root_dict
        .get_mut(b"Kids")
        .and_then(Object::as_array_mut)
        .map_err(malformed)?
        .push(Object::Reference(subtree));

    let count = root_dict.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    let added = i64::try_from(page_count).unwrap_or(i64::MAX);
    root_dict.set("Count", Object::Integer(count.saturating_add(added)));
    Ok(())
}

fn version_number(version: &str) -> f32 {
    version.trim().parse().unwrap_or(0.0)
}
