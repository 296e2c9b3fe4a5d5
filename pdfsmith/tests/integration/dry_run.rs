//! Dry runs report exactly what a real run would do, and write nothing.

use pdfsmith::compress::Compressor;
use pdfsmith::config::OutputRouting;
use pdfsmith::parallel::{ParallelExecutor, WorkerMode};
use rstest::rstest;
use tempfile::TempDir;

use crate::common::{list_dir, test_config, write_pdf};

#[rstest]
#[case::suffixed(OutputRouting::Suffixed)]
#[case::in_place(OutputRouting::InPlace)]
#[tokio::test]
async fn test_dry_run_writes_nothing(#[case] routing: OutputRouting) {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 2);
    let before = std::fs::read(&input).unwrap();
    let config = test_config(&dir.path().join("no-gs"), routing, true);

    let outcome = Compressor::new().compress(&input, &config).await.unwrap();

    assert!(outcome.improved());
    assert!(!outcome.written);
    assert_eq!(list_dir(dir.path()), vec!["doc.pdf"]);
    assert_eq!(std::fs::read(&input).unwrap(), before);
}

#[tokio::test]
async fn test_dry_run_into_directory_does_not_create_it() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "doc.pdf", 1);
    let out = dir.path().join("out");
    let config = test_config(
        &dir.path().join("no-gs"),
        OutputRouting::Directory(out.clone()),
        true,
    );

    let outcome = Compressor::new().compress(&input, &config).await.unwrap();

    assert_eq!(outcome.final_path, out.join("doc.compressed.pdf"));
    assert!(!out.exists());
}

#[tokio::test]
async fn test_dry_run_batch_matches_real_batch() {
    let dir = TempDir::new().unwrap();
    let inputs = vec![
        write_pdf(dir.path(), "a.pdf", 1),
        write_pdf(dir.path(), "b.pdf", 5),
        write_pdf(dir.path(), "c.pdf", 2),
    ];
    let gs = dir.path().join("no-gs");
    let executor = ParallelExecutor::new(WorkerMode::InProcess, 2);

    let dry = executor
        .run(&inputs, &test_config(&gs, OutputRouting::Suffixed, true), |_, _| {})
        .await;
    assert_eq!(list_dir(dir.path()), vec!["a.pdf", "b.pdf", "c.pdf"]);

    let real = executor
        .run(&inputs, &test_config(&gs, OutputRouting::Suffixed, false), |_, _| {})
        .await;

    for (dry, real) in dry.results.iter().zip(&real.results) {
        let (dry, real) = (dry.outcome().unwrap(), real.outcome().unwrap());
        assert_eq!(dry.chosen_strategy, real.chosen_strategy);
        assert_eq!(dry.final_size, real.final_size);
        assert!(!dry.written);
        assert!(real.written);
    }
    assert_eq!(dry.totals, real.totals);
    assert_eq!(list_dir(dir.path()).len(), 6);
}
