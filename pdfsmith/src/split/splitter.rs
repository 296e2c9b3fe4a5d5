//! Page extraction.

use lopdf::Document;
use std::path::{Path, PathBuf};

use super::pages::PageSelection;
use crate::error::{PdfSmithError, Result};
use crate::io::{load_document, save_document};

/// Where a split of `input` is written: `<stem>.split.pdf` in `dir`, or
/// next to the input.
pub fn split_output_path(input: &Path, dir: Option<&Path>) -> PathBuf {
    let stem = file_stem(input);
    let parent = dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    parent.join(format!("{stem}.split.pdf"))
}

/// File name of a single extracted page, e.g. `report_page_007.pdf`.
pub fn individual_page_name(stem: &str, page: u32) -> String {
    format!("{stem}_page_{page:03}.pdf")
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// One written split file.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    /// Source document.
    pub input_path: PathBuf,
    /// File written.
    pub output_path: PathBuf,
    /// 1-based source page numbers it holds, in order.
    pub pages: Vec<u32>,
    /// Size of the written file.
    pub output_size: u64,
}

/// Extracts selected pages into new documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct Splitter;

impl Splitter {
    /// Create a splitter.
    pub fn new() -> Self {
        Self
    }

    /// A copy of `doc` holding only `pages` (1-based, in document order).
    ///
    /// # Errors
    ///
    /// Returns [`PdfSmithError::InvalidPageRange`] if `pages` is empty or
    /// names a page the document does not have.
    pub fn extract_pages(&self, doc: &Document, pages: &[u32]) -> Result<Document> {
        let all_pages = doc.get_pages();
        let total = all_pages.len();
        let describe = || {
            pages
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };

        if pages.is_empty() {
            return Err(PdfSmithError::invalid_page_range("", "No pages selected"));
        }
        if let Some(missing) = pages.iter().find(|p| !all_pages.contains_key(p)) {
            return Err(PdfSmithError::invalid_page_range(
                describe(),
                format!("Invalid page: {missing} (valid: 1-{total})"),
            ));
        }

        let unwanted: Vec<u32> = all_pages
            .keys()
            .copied()
            .filter(|p| !pages.contains(p))
            .collect();

        let mut extracted = doc.clone();
        extracted.delete_pages(&unwanted);
        extracted.prune_objects();
        extracted.renumber_objects();
        extracted.compress();

        log::debug!("extracted {} of {} pages", pages.len(), total);
        Ok(extracted)
    }

    /// Write the selected pages of `input` to `output` as one document.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be loaded, the selection does
    /// not fit it, or the output cannot be written.
    pub async fn split(
        &self,
        input: &Path,
        selection: &PageSelection,
        output: &Path,
    ) -> Result<SplitOutcome> {
        let doc = load_document(input).await?;
        let pages = selection.resolve(page_total(&doc))?;
        let extracted = self.extract_pages(&doc, &pages)?;
        let output_size = save_document(extracted, output).await?;

        log::info!(
            "split {} pages of {} into {}",
            pages.len(),
            input.display(),
            output.display()
        );
        Ok(SplitOutcome {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            pages,
            output_size,
        })
    }

    /// Write each selected page of `input` to its own file in `dir`.
    ///
    /// `dir` is created if missing. Stops at the first page that cannot be
    /// written; files already written are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the input cannot be loaded, the selection does
    /// not fit it, or a page cannot be written.
    pub async fn split_individual(
        &self,
        input: &Path,
        selection: &PageSelection,
        dir: &Path,
    ) -> Result<Vec<SplitOutcome>> {
        let doc = load_document(input).await?;
        let pages = selection.resolve(page_total(&doc))?;

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| PdfSmithError::FailedToWrite {
                path: dir.to_path_buf(),
                source,
            })?;

        let stem = file_stem(input);
        let mut outcomes = Vec::with_capacity(pages.len());
        for page in pages {
            let output = dir.join(individual_page_name(&stem, page));
            let extracted = self.extract_pages(&doc, &[page])?;
            let output_size = save_document(extracted, &output).await?;
            outcomes.push(SplitOutcome {
                input_path: input.to_path_buf(),
                output_path: output,
                pages: vec![page],
                output_size,
            });
        }

        log::info!("split {} into {} files", input.display(), outcomes.len());
        Ok(outcomes)
    }
}

fn page_total(doc: &Document) -> u32 {
    u32::try_from(doc.get_pages().len()).unwrap_or(u32::MAX)
}
