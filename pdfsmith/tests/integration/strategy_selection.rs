//! End-to-end strategy selection on single files.

use pdfsmith::compress::{Compressor, StrategyKind};
use pdfsmith::config::OutputRouting;
use tempfile::TempDir;

use crate::common::{list_dir, size_of, test_config, write_corrupt_pdf, write_pdf};

#[tokio::test]
async fn test_structural_wins_without_ghostscript() {
    let dir = TempDir::new().unwrap();
    let input = write_pdf(dir.path(), "report.pdf", 4);
    let config = test_config(
        &dir.path().join("no-gs-here"),
        OutputRouting::Suffixed,
        false,
    );

    let outcome = Compressor::new().compress(&input, &config).await.unwrap();

    assert_eq!(outcome.chosen_strategy, Some(StrategyKind::Structural));
    assert!(outcome.final_size < outcome.original_size);
    assert_eq!(size_of(&outcome.final_path), outcome.final_size);
    assert_eq!(outcome.attempts.len(), 3);
    assert!(!outcome.attempts[1].result.is_success());
    assert!(!outcome.attempts[2].result.is_success());

    let reloaded = lopdf::Document::load(&outcome.final_path).unwrap();
    assert_eq!(reloaded.get_pages().len(), 4);
}

#[tokio::test]
async fn test_missing_input_is_an_error_not_a_panic() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir.path().join("gs"), OutputRouting::Suffixed, false);

    let err = Compressor::new()
        .compress(&dir.path().join("absent.pdf"), &config)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("absent.pdf"));
    assert_eq!(list_dir(dir.path()), Vec::<String>::new());
}

#[cfg(unix)]
mod with_fake_ghostscript {
    use super::*;
    use crate::common::fake_ghostscript;

    #[tokio::test]
    async fn test_only_lossy_succeeds() {
        let dir = TempDir::new().unwrap();
        // Structural cannot parse the input, and combined cannot parse the
        // lossy output, so the lossy candidate is the only one.
        let input = write_corrupt_pdf(dir.path(), "a.pdf");
        let gs = fake_ghostscript(dir.path(), "printf 'lossy' > \"$out\"");
        let config = test_config(&gs, OutputRouting::Suffixed, false);

        let outcome = Compressor::new().compress(&input, &config).await.unwrap();

        assert_eq!(outcome.chosen_strategy, Some(StrategyKind::ExternalLossy));
        assert_eq!(outcome.final_size, 5);
        assert_eq!(std::fs::read(&outcome.final_path).unwrap(), b"lossy");
    }

    #[tokio::test]
    async fn test_keeps_original_when_every_candidate_is_larger() {
        let dir = TempDir::new().unwrap();
        let input = write_corrupt_pdf(dir.path(), "b.pdf");
        let before = std::fs::read(&input).unwrap();
        let gs = fake_ghostscript(dir.path(), "head -c 100000 /dev/zero > \"$out\"");
        let config = test_config(&gs, OutputRouting::Suffixed, false);

        let outcome = Compressor::new().compress(&input, &config).await.unwrap();

        assert_eq!(outcome.chosen_strategy, None);
        assert_eq!(outcome.final_size, outcome.original_size);
        assert_eq!(std::fs::read(&outcome.final_path).unwrap(), before);
        assert_eq!(
            outcome.attempts[1].result.output_size(),
            Some(100_000),
            "a larger candidate is still a success"
        );
    }

    #[tokio::test]
    async fn test_never_regresses_in_place() {
        let dir = TempDir::new().unwrap();
        let input = write_corrupt_pdf(dir.path(), "c.pdf");
        let before = std::fs::read(&input).unwrap();
        let gs = fake_ghostscript(dir.path(), "head -c 100000 /dev/zero > \"$out\"");
        let config = test_config(&gs, OutputRouting::InPlace, false);

        let outcome = Compressor::new().compress(&input, &config).await.unwrap();

        assert!(!outcome.written);
        assert_eq!(std::fs::read(&input).unwrap(), before);
        assert_eq!(list_dir(dir.path()), vec!["c.pdf", "fake-gs"]);
    }

    #[tokio::test]
    async fn test_failing_ghostscript_leaves_structural() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(dir.path(), "d.pdf", 2);
        let gs = fake_ghostscript(dir.path(), "printf 'partial' > \"$out\"; exit 1");
        let config = test_config(&gs, OutputRouting::Directory(dir.path().join("out")), false);
        std::fs::create_dir(dir.path().join("out")).unwrap();

        let outcome = Compressor::new().compress(&input, &config).await.unwrap();

        assert_eq!(outcome.chosen_strategy, Some(StrategyKind::Structural));
        assert_eq!(outcome.final_path, dir.path().join("out/d.compressed.pdf"));
        assert_eq!(list_dir(&dir.path().join("out")), vec!["d.compressed.pdf"]);
    }

    #[tokio::test]
    async fn test_lossy_passthrough_never_wins() {
        let dir = TempDir::new().unwrap();
        let input = write_pdf(dir.path(), "e.pdf", 3);
        // A "lossy" pass that hands back the input unchanged; only the
        // structural rewrite, alone or after it, can shrink the file.
        let gs = fake_ghostscript(dir.path(), "cp \"$in\" \"$out\"");
        let config = test_config(&gs, OutputRouting::Suffixed, true);

        let outcome = Compressor::new().compress(&input, &config).await.unwrap();

        let sizes: Vec<_> = outcome
            .attempts
            .iter()
            .map(|a| a.result.output_size().unwrap())
            .collect();
        assert_eq!(sizes[1], outcome.original_size);
        assert!(sizes[2] < sizes[1]);
        assert_ne!(outcome.chosen_strategy, Some(StrategyKind::ExternalLossy));
        assert_eq!(outcome.final_size, sizes[0].min(sizes[2]));
        if sizes[0] == sizes[2] {
            assert_eq!(outcome.chosen_strategy, Some(StrategyKind::Structural));
        }
    }
}
