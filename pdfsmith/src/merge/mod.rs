//! Combine PDFs into one document, optionally grouped by file name.

pub mod grouping;
pub mod merger;

pub use grouping::{MergeGroup, base_name, group_by_base_name};
pub use merger::{MergeOutcome, Merger, default_merge_output};
