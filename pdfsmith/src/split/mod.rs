//! Extract pages from a PDF into a new file, or one file per page.

pub mod pages;
pub mod splitter;

pub use pages::PageSelection;
pub use splitter::{SplitOutcome, Splitter, individual_page_name, split_output_path};
