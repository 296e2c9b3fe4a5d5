//! Group files like `scan-1.pdf`, `scan-2.pdf` into one merge per base name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A set of files sharing a base name, merged into one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeGroup {
    /// Shared name, e.g. `scan` for `scan-1.pdf` and `scan_2.pdf`.
    pub base_name: String,
    /// Members in merge order.
    pub inputs: Vec<PathBuf>,
    /// `<base_name>.merged.pdf` next to the members.
    pub output: PathBuf,
}

/// File stem with a trailing number and its separator removed.
///
/// The separator is one or more of `-`, `_` or space. A stem without that
/// suffix, or made only of it, is returned whole.
///
/// ```
/// use pdfsmith::merge::base_name;
/// use std::path::Path;
///
/// assert_eq!(base_name(Path::new("scan - 12.pdf")), "scan");
/// assert_eq!(base_name(Path::new("scan12.pdf")), "scan12");
/// ```
pub fn base_name(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let without_number = stem.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_number.len() == stem.len() {
        return stem;
    }
    let base = without_number.trim_end_matches(['-', '_', ' ']);
    if base.len() == without_number.len() || base.is_empty() {
        return stem;
    }
    base.to_string()
}

fn trailing_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_string_lossy().into_owned();
    let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    stem[stem.len() - digits..].parse().ok()
}

/// Group `files` by directory and base name.
///
/// Only groups with at least two members are returned, ordered by
/// directory then base name. Members are ordered by their trailing number,
/// so `scan-2` comes before `scan-10`.
pub fn group_by_base_name(files: &[PathBuf]) -> Vec<MergeGroup> {
    let mut groups: BTreeMap<(PathBuf, String), Vec<PathBuf>> = BTreeMap::new();
    for file in files {
        let parent = file.parent().map(Path::to_path_buf).unwrap_or_default();
        groups
            .entry((parent, base_name(file)))
            .or_default()
            .push(file.clone());
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|((parent, base_name), mut inputs)| {
            inputs.sort_by(|a, b| {
                trailing_number(a)
                    .cmp(&trailing_number(b))
                    .then_with(|| a.cmp(b))
            });
            inputs.dedup();
            let output = parent.join(format!("{base_name}.merged.pdf"));
            MergeGroup {
                base_name,
                inputs,
                output,
            }
        })
        .filter(|group| group.inputs.len() > 1)
        .collect()
}
