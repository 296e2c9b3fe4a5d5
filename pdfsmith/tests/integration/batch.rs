//! Batches through the parallel executor.

use pdfsmith::config::OutputRouting;
use pdfsmith::parallel::{FailureKind, FileResult, ParallelExecutor, WorkerMode};
use rstest::rstest;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::common::{size_of, test_config, write_corrupt_pdf, write_pdf};

#[rstest]
#[case(1)]
#[case(2)]
#[case(16)]
#[tokio::test]
async fn test_batch_report_follows_input_order(#[case] workers: usize) {
    let dir = TempDir::new().unwrap();
    let inputs: Vec<PathBuf> = (0..6)
        .map(|i| write_pdf(dir.path(), &format!("part-{i}.pdf"), 6 - i))
        .collect();
    let config = test_config(&dir.path().join("no-gs"), OutputRouting::Suffixed, true);

    let report = ParallelExecutor::new(WorkerMode::InProcess, workers)
        .run(&inputs, &config, |_, _| {})
        .await;

    let order: Vec<PathBuf> = report
        .results
        .iter()
        .map(|r| r.input_path().to_path_buf())
        .collect();
    assert_eq!(order, inputs);
    assert_eq!(report.totals.files_processed, 6);
    assert_eq!(report.totals.files_failed, 0);
}

#[tokio::test]
async fn test_failures_are_isolated() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out");
    std::fs::create_dir(&out).unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "good.pdf", 3),
        write_corrupt_pdf(dir.path(), "broken.pdf"),
        dir.path().join("missing.pdf"),
        write_pdf(dir.path(), "also-good.pdf", 1),
    ];
    let config = test_config(
        &dir.path().join("no-gs"),
        OutputRouting::Directory(out.clone()),
        false,
    );

    let report = ParallelExecutor::new(WorkerMode::InProcess, 3)
        .run(&inputs, &config, |_, _| {})
        .await;

    assert_eq!(report.totals.files_processed, 3);
    assert_eq!(report.totals.files_failed, 1);
    assert!(matches!(
        &report.results[2],
        FileResult::Failed(failure) if failure.kind == FailureKind::Input
    ));

    // The unparseable file is processed: its original is copied unchanged.
    let broken = report.results[1].outcome().unwrap();
    assert_eq!(broken.chosen_strategy, None);
    assert_eq!(
        std::fs::read(out.join("broken.compressed.pdf")).unwrap(),
        std::fs::read(&inputs[1]).unwrap()
    );

    for idx in [0, 3] {
        let outcome = report.results[idx].outcome().unwrap();
        assert!(outcome.improved());
        assert_eq!(size_of(&outcome.final_path), outcome.final_size);
    }

    assert_eq!(
        report.totals.bytes_saved,
        report.totals.original_bytes - report.totals.final_bytes
    );
}

#[tokio::test]
async fn test_in_place_batch_shrinks_every_file() {
    let dir = TempDir::new().unwrap();
    let inputs: Vec<PathBuf> = (1..=3)
        .map(|i| write_pdf(dir.path(), &format!("scan-{i}.pdf"), i))
        .collect();
    let before: Vec<u64> = inputs.iter().map(|p| size_of(p)).collect();
    let config = test_config(&dir.path().join("no-gs"), OutputRouting::InPlace, false);

    let report = ParallelExecutor::new(WorkerMode::InProcess, 0)
        .run(&inputs, &config, |_, _| {})
        .await;

    for ((input, original), result) in inputs.iter().zip(before).zip(&report.results) {
        let outcome = result.outcome().unwrap();
        assert_eq!(outcome.final_path, *input);
        assert!(size_of(input) < original);
        assert!(lopdf::Document::load(input).is_ok());
    }
}

#[tokio::test]
async fn test_cancel_before_start_reports_every_file() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![write_pdf(dir.path(), "a.pdf", 1), write_pdf(dir.path(), "b.pdf", 1)];
    let config = test_config(&dir.path().join("no-gs"), OutputRouting::Suffixed, false);

    let report = ParallelExecutor::new(WorkerMode::InProcess, 1)
        .run_until(&inputs, &config, |_, _| {}, std::future::ready(()))
        .await;

    assert!(report.cancelled);
    assert_eq!(report.totals.files_failed, 2);
    assert!(
        report
            .failures()
            .all(|failure| failure.kind == FailureKind::Cancelled)
    );
    assert!(!dir.path().join("a.compressed.pdf").exists());
}
