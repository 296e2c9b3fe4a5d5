//! PDF loading.
//!
//! lopdf opens a document whose user password is empty on its own and hands
//! back decrypted objects. Such a document is turned into a plain one here,
//! so callers never save decrypted content under a stale `Encrypt` entry.
//! A document that needs a real password is returned with its protection
//! recorded and no usable content.

use lopdf::{Document, Object};
use std::path::{Path, PathBuf};
use tokio::task;

use crate::error::{PdfSmithError, Result};

/// Encryption state of a loaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    /// Not encrypted.
    None,
    /// Encrypted with an empty user password; already decrypted.
    OwnerOnly,
    /// Needs a password to open; content was not loaded.
    Password,
}

impl Protection {
    /// Whether the file on disk is encrypted.
    pub fn is_encrypted(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// A loaded PDF document.
#[derive(Debug)]
pub struct LoadedPdf {
    /// The document, decrypted unless `protection` is [`Protection::Password`].
    pub document: Document,
    /// Where it was loaded from.
    pub path: PathBuf,
    /// Encryption state of the file on disk.
    pub protection: Protection,
}

impl LoadedPdf {
    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// The document, if its content is readable.
    ///
    /// # Errors
    ///
    /// Returns [`PdfSmithError::EncryptedPdf`] when a password is needed.
    pub fn into_document(self) -> Result<Document> {
        match self.protection {
            Protection::Password => Err(PdfSmithError::encrypted_pdf(self.path)),
            Protection::None | Protection::OwnerOnly => Ok(self.document),
        }
    }
}

/// Load a PDF, whatever its encryption.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a PDF.
pub async fn load_pdf(path: &Path) -> Result<LoadedPdf> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| PdfSmithError::from_input_io(path.to_path_buf(), e))?;
    if !metadata.is_file() {
        return Err(PdfSmithError::not_a_file(path.to_path_buf()));
    }

    let path_buf = path.to_path_buf();
    task::spawn_blocking(move || {
        let mut document = Document::load(&path_buf)
            .map_err(|e| PdfSmithError::failed_to_load_pdf(path_buf.clone(), e.to_string()))?;

        let protection = if !document.is_encrypted() {
            Protection::None
        } else if document.encryption_state.is_some() {
            strip_encryption(&mut document);
            Protection::OwnerOnly
        } else {
            Protection::Password
        };

        log::debug!(
            "loaded {} ({} pages, {:?})",
            path_buf.display(),
            document.get_pages().len(),
            protection
        );

        Ok(LoadedPdf {
            document,
            path: path_buf,
            protection,
        })
    })
    .await
    .map_err(|e| PdfSmithError::other(format!("Load task failed: {e}")))?
}

/// Load a PDF whose content must be readable without a password.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a PDF, or needs a
/// password.
pub async fn load_document(path: &Path) -> Result<Document> {
    load_pdf(path).await?.into_document()
}

/// Turn a document decrypted on load into an unencrypted one.
pub(crate) fn strip_encryption(document: &mut Document) {
    if let Ok(Object::Reference(id)) = document.trailer.get(b"Encrypt") {
        let id = *id;
        document.objects.remove(&id);
    }
    document.trailer.remove(b"Encrypt");
    document.encryption_state = None;
}
