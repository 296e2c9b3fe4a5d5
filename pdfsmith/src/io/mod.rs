//! PDF loading and atomic output writes shared by every operation.

pub mod reader;
pub mod writer;

pub use reader::{LoadedPdf, Protection, load_document, load_pdf};
pub use writer::{remove_staged, replace_atomically, save_document};
