//! Lossy optimizer backed by Ghostscript.
//!
//! Ghostscript is run as a subprocess with the `pdfwrite` device. The
//! quality preset selects `-dPDFSETTINGS`, which controls image resampling
//! and stream recompression. The child is killed when its timeout expires
//! or when the surrounding future is dropped.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use super::{CandidateGuard, StrategyResult};
use crate::config::{CompressionConfig, QualityPreset};
use crate::error::{PdfSmithError, Result};
use crate::utils::describe_exit;

/// Executable names searched on PATH, in order.
pub const PROGRAM_NAMES: [&str; 3] = ["gs", "gswin64c", "gswin32c"];

/// Longest stderr excerpt kept in a failure reason.
const MAX_STDERR: usize = 2048;

/// Installation hints shown when Ghostscript is missing.
pub fn install_instructions() -> &'static str {
    "Install Ghostscript:\n  \
     macOS:         brew install ghostscript\n  \
     Ubuntu/Debian: apt install ghostscript\n  \
     Fedora/RHEL:   dnf install ghostscript"
}

/// A configured Ghostscript invocation.
#[derive(Debug, Clone)]
pub struct Ghostscript {
    program: PathBuf,
    timeout: Duration,
    diagnostics: bool,
}

impl Ghostscript {
    /// Create an invocation for `program`.
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            diagnostics: false,
        }
    }

    /// Build the invocation described by a run configuration.
    pub fn from_config(config: &CompressionConfig) -> Self {
        Self {
            program: config.ghostscript.clone(),
            timeout: config.timeout,
            diagnostics: config.diagnostics,
        }
    }

    /// Keep Ghostscript's stderr in failure reasons.
    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Program this invocation runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Find Ghostscript once per invocation.
    ///
    /// An explicit program (a path or a bare name) is checked as given;
    /// otherwise each of [`PROGRAM_NAMES`] is looked up on PATH.
    ///
    /// # Errors
    ///
    /// Returns [`PdfSmithError::Setup`] when nothing usable is found.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(program) = explicit {
            return which::which(program).map_err(|err| {
                PdfSmithError::setup(
                    format!("ghostscript ({}: {err})", program.display()),
                    install_instructions(),
                )
            });
        }

        PROGRAM_NAMES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| PdfSmithError::setup("ghostscript", install_instructions()))
    }

    /// Command-line arguments for one conversion.
    pub fn arguments(&self, quality: QualityPreset, input: &Path, output: &Path) -> Vec<OsString> {
        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(output);

        vec![
            "-sDEVICE=pdfwrite".into(),
            format!("-dCompatibilityLevel={}", quality.compatibility_level()).into(),
            format!("-dPDFSETTINGS={}", quality.pdf_settings()).into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-dBATCH".into(),
            "-dSAFER".into(),
            "-dDetectDuplicateImages=true".into(),
            "-dCompressFonts=true".into(),
            "-dSubsetFonts=true".into(),
            output_arg,
            input.as_os_str().to_os_string(),
        ]
    }

    /// Command-line arguments for decrypting `input` with `password`.
    pub fn unlock_arguments(&self, input: &Path, output: &Path, password: &str) -> Vec<OsString> {
        let mut output_arg = OsString::from("-sOutputFile=");
        output_arg.push(output);

        vec![
            "-sDEVICE=pdfwrite".into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-dBATCH".into(),
            "-dSAFER".into(),
            format!("-sPDFPassword={password}").into(),
            output_arg,
            input.as_os_str().to_os_string(),
        ]
    }

    /// Run Ghostscript on `input`, writing the candidate to `output`.
    pub async fn compress(
        &self,
        input: &Path,
        output: &Path,
        quality: QualityPreset,
    ) -> StrategyResult {
        let guard = CandidateGuard::new(output.to_path_buf());

        match self.run(self.arguments(quality, input, output), output).await {
            Ok(output_size) => StrategyResult::Success {
                output_size,
                output_path: guard.keep(),
            },
            Err(reason) => StrategyResult::failure(reason),
        }
    }

    /// Rewrite a password-protected `input` as an unencrypted `output`.
    ///
    /// Returns the size of the written file. Nothing is left at `output`
    /// on failure.
    ///
    /// # Errors
    ///
    /// Returns the failure reason when Ghostscript cannot be started, fails,
    /// times out or writes nothing.
    pub async fn unlock(
        &self,
        input: &Path,
        output: &Path,
        password: &str,
    ) -> std::result::Result<u64, String> {
        let guard = CandidateGuard::new(output.to_path_buf());
        let size = self
            .run(self.unlock_arguments(input, output, password), output)
            .await?;
        guard.keep();
        Ok(size)
    }

    async fn run(&self, args: Vec<OsString>, output: &Path) -> std::result::Result<u64, String> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(if self.diagnostics {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(format!("Ghostscript not found at {}", self.program.display()));
            }
            Err(err) => return Err(format!("failed to start Ghostscript: {err}")),
        };

        let finished = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(finished)) => finished,
            Ok(Err(err)) => return Err(format!("failed to wait for Ghostscript: {err}")),
            Err(_) => {
                return Err(format!(
                    "Ghostscript timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
        };

        if !finished.status.success() {
            let mut reason = format!("Ghostscript failed ({})", describe_exit(finished.status));
            if self.diagnostics {
                let stderr = String::from_utf8_lossy(&finished.stderr);
                let stderr = stderr.trim();
                if !stderr.is_empty() {
                    let excerpt: String = stderr.chars().take(MAX_STDERR).collect();
                    reason.push_str(": ");
                    reason.push_str(&excerpt);
                }
            }
            return Err(reason);
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(meta.len()),
            Ok(_) => Err("Ghostscript produced an empty file".to_string()),
            Err(err) => Err(format!("Ghostscript produced no output: {err}")),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{fake_ghostscript, write_test_pdf};
    use tempfile::TempDir;

    const LIMIT: Duration = Duration::from_secs(30);

    #[test]
    fn test_arguments_encode_preset_and_paths() {
        let gs = Ghostscript::new("gs", LIMIT);
        let args = gs.arguments(
            QualityPreset::Screen,
            Path::new("/in/a.pdf"),
            Path::new("/out/a.pdf"),
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"-sDEVICE=pdfwrite".to_string()));
        assert!(args.contains(&"-dPDFSETTINGS=/screen".to_string()));
        assert!(args.contains(&"-dCompatibilityLevel=1.4".to_string()));
        assert!(args.contains(&"-dNOPAUSE".to_string()));
        assert!(args.contains(&"-dBATCH".to_string()));
        assert!(args.contains(&"-sOutputFile=/out/a.pdf".to_string()));
        assert_eq!(args.last().unwrap(), "/in/a.pdf");
    }

    #[test]
    fn test_unlock_arguments_carry_password() {
        let gs = Ghostscript::new("gs", LIMIT);
        let args: Vec<String> = gs
            .unlock_arguments(Path::new("/in/a.pdf"), Path::new("/out/a.pdf"), "s3cret")
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"-sPDFPassword=s3cret".to_string()));
        assert!(args.contains(&"-sOutputFile=/out/a.pdf".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("-dPDFSETTINGS")));
        assert_eq!(args.last().unwrap(), "/in/a.pdf");
    }

    #[tokio::test]
    async fn test_unlock_failure_removes_output() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "in.pdf", 1);
        let output = dir.path().join("plain.pdf");
        let gs = fake_ghostscript(dir.path(), "gs-fail", "printf 'half' > \"$out\"; exit 1");

        let reason = Ghostscript::new(&gs, LIMIT)
            .unlock(&input, &output, "pw")
            .await
            .unwrap_err();

        assert!(reason.contains("exit code 1"), "{reason}");
        assert!(!output.exists());
    }

    #[test]
    fn test_locate_explicit_missing_is_setup_error() {
        let err = Ghostscript::locate(Some(Path::new("/definitely/not/here/gs"))).unwrap_err();
        assert!(err.is_setup());
        assert!(err.to_string().contains("Install Ghostscript"));
    }

    #[test]
    fn test_locate_explicit_script() {
        let dir = TempDir::new().unwrap();
        let gs = fake_ghostscript(dir.path(), "gs-ok", "printf 'tiny' > \"$out\"");

        assert_eq!(Ghostscript::locate(Some(&gs)).unwrap(), gs);
    }

    #[tokio::test]
    async fn test_compress_success() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "in.pdf", 1);
        let output = dir.path().join("lossy.pdf");
        let gs = fake_ghostscript(dir.path(), "gs-ok", "printf 'tiny pdf' > \"$out\"");

        let result = Ghostscript::new(&gs, LIMIT)
            .compress(&input, &output, QualityPreset::Ebook)
            .await;

        assert_eq!(
            result,
            StrategyResult::Success {
                output_path: output.clone(),
                output_size: 8,
            }
        );
    }

    #[tokio::test]
    async fn test_compress_nonzero_exit_cleans_partial_output() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "in.pdf", 1);
        let output = dir.path().join("lossy.pdf");
        let gs = fake_ghostscript(
            dir.path(),
            "gs-fail",
            "printf 'half' > \"$out\"; echo 'Error: /undefined' >&2; exit 3",
        );

        let result = Ghostscript::new(&gs, LIMIT)
            .with_diagnostics(true)
            .compress(&input, &output, QualityPreset::Ebook)
            .await;

        match result {
            StrategyResult::Failure { reason } => {
                assert!(reason.contains("exit code 3"), "{reason}");
                assert!(reason.contains("/undefined"), "{reason}");
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_compress_stderr_suppressed_without_diagnostics() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "in.pdf", 1);
        let gs = fake_ghostscript(dir.path(), "gs-fail", "echo 'noisy' >&2; exit 1");

        let result = Ghostscript::new(&gs, LIMIT)
            .compress(&input, &dir.path().join("lossy.pdf"), QualityPreset::Ebook)
            .await;

        match result {
            StrategyResult::Failure { reason } => assert!(!reason.contains("noisy")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_compress_empty_output_is_failure() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "in.pdf", 1);
        let output = dir.path().join("lossy.pdf");
        let gs = fake_ghostscript(dir.path(), "gs-empty", ": > \"$out\"");

        let result = Ghostscript::new(&gs, LIMIT)
            .compress(&input, &output, QualityPreset::Ebook)
            .await;

        assert!(!result.is_success());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_compress_missing_binary_is_failure() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "in.pdf", 1);

        let result = Ghostscript::new(dir.path().join("no-such-gs"), LIMIT)
            .compress(&input, &dir.path().join("lossy.pdf"), QualityPreset::Ebook)
            .await;

        assert!(matches!(result, StrategyResult::Failure { .. }));
    }

    #[tokio::test]
    async fn test_compress_timeout_kills_and_cleans() {
        let dir = TempDir::new().unwrap();
        let input = write_test_pdf(dir.path(), "in.pdf", 1);
        let output = dir.path().join("lossy.pdf");
        let gs = fake_ghostscript(dir.path(), "gs-hang", "printf 'x' > \"$out\"; sleep 30");

        let result = Ghostscript::new(&gs, Duration::from_millis(300))
            .compress(&input, &output, QualityPreset::Ebook)
            .await;

        match result {
            StrategyResult::Failure { reason } => assert!(reason.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(!output.exists());
    }
}
