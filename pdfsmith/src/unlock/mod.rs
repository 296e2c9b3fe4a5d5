//! Remove encryption from PDFs.
//!
//! A file that opens without a password (owner password only) is rewritten
//! by lopdf with its `Encrypt` entry dropped. A file that needs a user
//! password is checked against that password and then rewritten by
//! Ghostscript. Either way the result is written to a scratch file, reopened
//! to confirm it is no longer encrypted, and only then moved to its
//! destination.

use std::path::{Path, PathBuf};

use crate::compress::Ghostscript;
use crate::compress::orchestrator::scratch_dir;
use crate::error::{PdfSmithError, Result};
use crate::io::{LoadedPdf, Protection, load_pdf, replace_atomically, save_document};

/// Where an unlocked copy of `input` is written: `<stem>.unlocked.pdf` in
/// `dir`, or next to the input.
pub fn unlock_output_path(input: &Path, dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let parent = dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    parent.join(format!("{stem}.unlocked.pdf"))
}

/// Whether the PDF at `path` is encrypted.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a PDF.
pub async fn is_encrypted(path: &Path) -> Result<bool> {
    Ok(load_pdf(path).await?.protection.is_encrypted())
}

/// Result of unlocking one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockOutcome {
    /// Source file.
    pub input_path: PathBuf,
    /// Destination; unchanged when the input was not encrypted.
    pub output_path: PathBuf,
    /// Protection the input had.
    pub protection: Protection,
    /// Size of the written file, if one was written.
    pub output_size: Option<u64>,
}

impl UnlockOutcome {
    /// Whether the input was encrypted.
    pub fn was_encrypted(&self) -> bool {
        self.protection.is_encrypted()
    }
}

/// Removes encryption, with Ghostscript for password-protected files.
#[derive(Debug, Clone, Default)]
pub struct Unlocker {
    ghostscript: Option<Ghostscript>,
}

impl Unlocker {
    /// Create an unlocker. Without Ghostscript only files that open
    /// without a password can be unlocked.
    pub fn new(ghostscript: Option<Ghostscript>) -> Self {
        Self { ghostscript }
    }

    /// Write an unencrypted copy of `input` to `output`.
    ///
    /// An input that is not encrypted is skipped and nothing is written.
    /// `output` may equal `input`.
    ///
    /// # Errors
    ///
    /// - [`PdfSmithError::PasswordRequired`] if the input needs a password
    ///   and none was given
    /// - [`PdfSmithError::IncorrectPassword`] if the password does not open it
    /// - [`PdfSmithError::Setup`] if it needs Ghostscript and none is set
    /// - [`PdfSmithError::UnlockFailed`] if the rewrite fails or is still
    ///   encrypted
    pub async fn unlock(
        &self,
        input: &Path,
        output: &Path,
        password: Option<&str>,
    ) -> Result<UnlockOutcome> {
        let loaded = load_pdf(input).await?;
        let protection = loaded.protection;

        if protection == Protection::None {
            log::info!("{} is not encrypted, skipped", input.display());
            return Ok(UnlockOutcome {
                input_path: input.to_path_buf(),
                output_path: output.to_path_buf(),
                protection,
                output_size: None,
            });
        }

        let scratch = scratch_dir()?;
        let staged = scratch.path().join("unlocked.pdf");
        match protection {
            Protection::Password => self.decrypt(loaded, &staged, password).await?,
            Protection::None | Protection::OwnerOnly => {
                save_document(loaded.document, &staged).await?;
            }
        }

        let check = load_pdf(&staged)
            .await
            .map_err(|e| PdfSmithError::unlock_failed(input.to_path_buf(), e.to_string()))?;
        if check.protection.is_encrypted() {
            return Err(PdfSmithError::unlock_failed(
                input.to_path_buf(),
                "output is still encrypted",
            ));
        }

        replace_atomically(&staged, output, input).await?;
        let output_size = tokio::fs::metadata(output).await?.len();

        log::info!(
            "unlocked {} into {} ({:?})",
            input.display(),
            output.display(),
            protection
        );
        Ok(UnlockOutcome {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            protection,
            output_size: Some(output_size),
        })
    }

    async fn decrypt(
        &self,
        loaded: LoadedPdf,
        staged: &Path,
        password: Option<&str>,
    ) -> Result<()> {
        let password = password.ok_or_else(|| PdfSmithError::PasswordRequired {
            path: loaded.path.clone(),
        })?;
        if loaded.document.authenticate_password(password).is_err() {
            return Err(PdfSmithError::IncorrectPassword { path: loaded.path });
        }

        let gs = self.ghostscript.as_ref().ok_or_else(|| {
            PdfSmithError::setup(
                "ghostscript",
                format!(
                    "Unlocking a password-protected PDF needs Ghostscript.\n{}",
                    crate::compress::ghostscript::install_instructions()
                ),
            )
        })?;

        gs.unlock(&loaded.path, staged, password)
            .await
            .map(|_| ())
            .map_err(|reason| PdfSmithError::unlock_failed(loaded.path.clone(), reason))
    }
}
