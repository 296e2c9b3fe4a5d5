//! Merge, split and unlock through the public API, chained the way a user
//! would chain the subcommands.

use pdfsmith::PdfSmithError;
use pdfsmith::compress::Compressor;
use pdfsmith::config::OutputRouting;
use pdfsmith::io::{Protection, load_pdf};
use pdfsmith::merge::{Merger, group_by_base_name};
use pdfsmith::split::{PageSelection, Splitter};
use pdfsmith::unlock::Unlocker;
use tempfile::TempDir;

use crate::common::{
    list_dir, page_count, page_labels, test_config, write_encrypted_pdf, write_pdf,
};

#[tokio::test]
async fn test_unlock_then_merge_then_split() {
    let dir = TempDir::new().unwrap();
    let locked = write_encrypted_pdf(dir.path(), "part-1.pdf", 2, "");
    let plain = write_pdf(dir.path(), "part-2.pdf", 3);

    let unlocked = dir.path().join("part-1.open.pdf");
    Unlocker::new(None).unlock(&locked, &unlocked, None).await.unwrap();

    let merged = dir.path().join("all.pdf");
    let outcome = Merger::new()
        .merge(&[unlocked.clone(), plain.clone()], &merged)
        .await
        .unwrap();
    assert_eq!(outcome.page_count, 5);

    let selection = PageSelection::parse("2-3").unwrap();
    let split = dir.path().join("middle.pdf");
    Splitter::new().split(&merged, &selection, &split).await.unwrap();

    assert_eq!(page_labels(&split), vec!["Page 1", "Page 0"]);
    let reloaded = load_pdf(&split).await.unwrap();
    assert_eq!(reloaded.protection, Protection::None);
}

#[tokio::test]
async fn test_encrypted_input_is_rejected_until_unlocked() {
    let dir = TempDir::new().unwrap();
    let locked = write_encrypted_pdf(dir.path(), "locked.pdf", 2, "secret");
    let other = write_pdf(dir.path(), "other.pdf", 1);
    let output = dir.path().join("merged.pdf");

    let err = Merger::new().merge(&[locked.clone(), other], &output).await.unwrap_err();
    assert!(matches!(err, PdfSmithError::EncryptedPdf { .. }));
    assert!(err.to_string().contains("pdfsmith unlock"));

    let err = Splitter::new()
        .split(&locked, &PageSelection::parse("all").unwrap(), &dir.path().join("s.pdf"))
        .await
        .unwrap_err();
    assert!(matches!(err, PdfSmithError::EncryptedPdf { .. }));

    assert_eq!(list_dir(dir.path()), vec!["locked.pdf", "other.pdf"]);
}

#[tokio::test]
async fn test_grouped_merge_outputs_compress() {
    let dir = TempDir::new().unwrap();
    let files = vec![
        write_pdf(dir.path(), "scan_1.pdf", 1),
        write_pdf(dir.path(), "scan_2.pdf", 1),
        write_pdf(dir.path(), "notes.pdf", 1),
    ];

    let groups = group_by_base_name(&files);
    assert_eq!(groups.len(), 1);

    let group = &groups[0];
    Merger::new().merge(&group.inputs, &group.output).await.unwrap();
    assert_eq!(page_count(&group.output), 2);

    // Missing Ghostscript leaves the structural strategy to win.
    let config = test_config(&dir.path().join("no-gs"), OutputRouting::Suffixed, false);
    let outcome = Compressor::new().compress(&group.output, &config).await.unwrap();
    assert!(outcome.final_size <= outcome.original_size);
    assert_eq!(page_count(&outcome.final_path), 2);
}
