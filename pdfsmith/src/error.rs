//! Error types for pdfsmith.
//!
//! Only conditions that stop a whole file (or the whole batch) are errors.
//! A strategy that cannot produce a candidate reports
//! [`StrategyResult::Failure`](crate::compress::StrategyResult) instead and
//! never reaches this module.
//!
//! # Error Categories
//!
//! - **Setup Errors**: the external optimizer is not installed
//! - **Input Errors**: file not found, not a file, unreadable
//! - **PDF Errors**: unparsable, encrypted, wrong password
//! - **Page Errors**: a page selection that does not fit the document
//! - **Output Errors**: the final write to the destination failed
//! - **Protocol Errors**: a worker job or reply could not be decoded

use std::io;
use std::path::PathBuf;

/// Result type alias for pdfsmith operations.
pub type Result<T> = std::result::Result<T, PdfSmithError>;

/// Main error type for pdfsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum PdfSmithError {
    /// A required external program is not available.
    #[error("Required tool not found: {tool}\n{hint}")]
    Setup {
        /// Name of the missing tool.
        tool: String,
        /// Installation instructions.
        hint: String,
    },

    /// Input file was not found.
    #[error("File not found: {}", .path.display())]
    FileNotFound {
        /// Path to the file that was not found.
        path: PathBuf,
    },

    /// Input file is not accessible (permission denied, etc.).
    #[error("Cannot access file: {}\n  Reason: {source}", .path.display())]
    FileNotAccessible {
        /// Path to the inaccessible file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Input path exists but is not a regular file.
    #[error("Not a file: {}", .path.display())]
    NotAFile {
        /// Path that is not a file.
        path: PathBuf,
    },

    /// Failed to load PDF file.
    #[error("Failed to load PDF: {}\n  Reason: {reason}", .path.display())]
    FailedToLoadPdf {
        /// Path to the PDF file.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// PDF file is encrypted and no usable password was given.
    #[error(
        "PDF is encrypted and cannot be processed: {}\n  \
         Hint: Remove the password first with 'pdfsmith unlock'",
        .path.display()
    )]
    EncryptedPdf {
        /// Path to the encrypted PDF.
        path: PathBuf,
    },

    /// The password does not open the PDF.
    #[error("Incorrect password for: {}", .path.display())]
    IncorrectPassword {
        /// Path to the encrypted PDF.
        path: PathBuf,
    },

    /// The PDF needs a password and none was given.
    #[error(
        "A password is required to open: {}\n  \
         Hint: Pass it with --password or PDFSMITH_PASSWORD",
        .path.display()
    )]
    PasswordRequired {
        /// Path to the encrypted PDF.
        path: PathBuf,
    },

    /// Removing encryption failed.
    #[error("Failed to unlock: {}\n  Reason: {reason}", .path.display())]
    UnlockFailed {
        /// Path to the encrypted PDF.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Page selection is invalid for the PDF.
    #[error("Invalid page selection '{range}': {reason}")]
    InvalidPageRange {
        /// Requested pages as typed.
        range: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Merge operation failed.
    #[error("Merge operation failed: {reason}")]
    MergeFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// Failed to write the final output file.
    #[error("Failed to write output file: {}\n  Reason: {source}", .path.display())]
    FailedToWrite {
        /// Path being written to.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of what's wrong with the configuration.
        message: String,
    },

    /// User cancelled the operation.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// Generic I/O error.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// Malformed JSON on the worker channel.
    #[error("Invalid worker message: {source}")]
    Json {
        /// Underlying serde error.
        #[from]
        source: serde_json::Error,
    },

    /// Generic error with a custom message.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl From<anyhow::Error> for PdfSmithError {
    fn from(err: anyhow::Error) -> Self {
        Self::other(err.to_string())
    }
}

impl PdfSmithError {
    /// Create a Setup error.
    pub fn setup(tool: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Setup {
            tool: tool.into(),
            hint: hint.into(),
        }
    }

    /// Create a FileNotFound error.
    pub fn file_not_found(path: PathBuf) -> Self {
        Self::FileNotFound { path }
    }

    /// Create a NotAFile error.
    pub fn not_a_file(path: PathBuf) -> Self {
        Self::NotAFile { path }
    }

    /// Create a FailedToLoadPdf error.
    pub fn failed_to_load_pdf(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::FailedToLoadPdf {
            path,
            reason: reason.into(),
        }
    }

    /// Create an EncryptedPdf error.
    pub fn encrypted_pdf(path: PathBuf) -> Self {
        Self::EncryptedPdf { path }
    }

    /// Create an UnlockFailed error.
    pub fn unlock_failed(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::UnlockFailed {
            path,
            reason: reason.into(),
        }
    }

    /// Create an InvalidPageRange error.
    pub fn invalid_page_range(range: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPageRange {
            range: range.into(),
            reason: reason.into(),
        }
    }

    /// Create a MergeFailed error.
    pub fn merge_failed(reason: impl Into<String>) -> Self {
        Self::MergeFailed {
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an Other error with a custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Map an I/O error on an input path to the most specific variant.
    pub fn from_input_io(path: PathBuf, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::FileNotFound { path },
            _ => Self::FileNotAccessible { path, source: err },
        }
    }

    /// Check if this error must abort the batch before any file is processed.
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Setup { .. } | Self::InvalidConfig { .. })
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Setup { .. } => 2,
            Self::FileNotFound { .. } => 3,
            Self::FileNotAccessible { .. } => 3,
            Self::NotAFile { .. } => 3,
            Self::FailedToLoadPdf { .. } => 3,
            Self::EncryptedPdf { .. } => 3,
            Self::IncorrectPassword { .. } => 4,
            Self::PasswordRequired { .. } => 4,
            Self::UnlockFailed { .. } => 6,
            Self::InvalidPageRange { .. } => 1,
            Self::MergeFailed { .. } => 6,
            Self::FailedToWrite { .. } => 5,
            Self::InvalidConfig { .. } => 1,
            Self::Cancelled => 130, // Standard exit code for SIGINT
            Self::Io { .. } => 5,
            Self::Json { .. } => 6,
            Self::Other { .. } => 1,
        }
    }
}
