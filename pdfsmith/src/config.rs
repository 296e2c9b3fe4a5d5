//! Configuration for a compression run.
//!
//! A [`CompressionConfig`] is built once by the CLI layer, validated, and then
//! shared read-only by every worker. It is serializable because worker
//! processes receive it verbatim as part of their job.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::PdfSmithError;

/// Default time budget for one external or structural stage.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Suffix appended to the file stem for default and directory routing.
pub const COMPRESSED_SUFFIX: &str = "compressed";

/// Quality preset controlling the lossy optimizer's resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// 72 dpi, aggressive, meant for on-screen viewing.
    Screen,
    /// 150 dpi, balanced.
    #[default]
    Ebook,
    /// 300 dpi, high quality.
    Printer,
    /// 300 dpi with colour preservation, highest quality.
    Prepress,
}

impl QualityPreset {
    /// All presets, from smallest to largest output.
    pub const ALL: [QualityPreset; 4] = [Self::Screen, Self::Ebook, Self::Printer, Self::Prepress];

    /// Lowercase preset name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Screen => "screen",
            Self::Ebook => "ebook",
            Self::Printer => "printer",
            Self::Prepress => "prepress",
        }
    }

    /// Target image resolution in dots per inch.
    pub fn dpi(&self) -> u32 {
        match self {
            Self::Screen => 72,
            Self::Ebook => 150,
            Self::Printer | Self::Prepress => 300,
        }
    }

    /// Value for Ghostscript's `-dPDFSETTINGS`.
    pub fn pdf_settings(&self) -> &'static str {
        match self {
            Self::Screen => "/screen",
            Self::Ebook => "/ebook",
            Self::Printer => "/printer",
            Self::Prepress => "/prepress",
        }
    }

    /// PDF compatibility level of the lossy output.
    pub fn compatibility_level(&self) -> &'static str {
        "1.4"
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} dpi)", self.name(), self.dpi())
    }
}

impl FromStr for QualityPreset {
    type Err = PdfSmithError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "screen" => Ok(Self::Screen),
            "ebook" => Ok(Self::Ebook),
            "printer" => Ok(Self::Printer),
            "prepress" => Ok(Self::Prepress),
            _ => Err(PdfSmithError::invalid_config(format!(
                "Invalid quality '{s}'. Must be one of: screen, ebook, printer, prepress"
            ))),
        }
    }
}

/// Where the compressed result of each input goes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "path")]
pub enum OutputRouting {
    /// Write to exactly this path (single input only).
    Explicit(PathBuf),
    /// Write `<stem>.compressed.pdf` into this directory.
    Directory(PathBuf),
    /// Replace the input file.
    InPlace,
    /// Write `<stem>.compressed.pdf` next to the input.
    #[default]
    Suffixed,
}

impl OutputRouting {
    /// Resolve the destination path for one input.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdfsmith::config::OutputRouting;
    /// use std::path::{Path, PathBuf};
    ///
    /// let routing = OutputRouting::Directory(PathBuf::from("out"));
    /// assert_eq!(
    ///     routing.resolve(Path::new("docs/report.pdf")),
    ///     PathBuf::from("out/report.compressed.pdf")
    /// );
    /// ```
    pub fn resolve(&self, input: &Path) -> PathBuf {
        match self {
            Self::Explicit(path) => path.clone(),
            Self::InPlace => input.to_path_buf(),
            Self::Directory(dir) => dir.join(suffixed_name(input)),
            Self::Suffixed => input.with_file_name(suffixed_name(input)),
        }
    }

    /// Short human description used in banners.
    pub fn describe(&self) -> String {
        match self {
            Self::Explicit(path) => path.display().to_string(),
            Self::Directory(dir) => format!("{}/", dir.display()),
            Self::InPlace => "replacing original files".to_string(),
            Self::Suffixed => format!("same directory as input (*.{COMPRESSED_SUFFIX}.pdf)"),
        }
    }
}

fn suffixed_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    format!("{stem}.{COMPRESSED_SUFFIX}.pdf")
}

/// How two inputs of one batch collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// The same input appears twice.
    DuplicateInput,
    /// Two inputs resolve to the same destination.
    SharedDestination,
    /// One input's destination is another input.
    OverwritesInput,
}

/// Two inputs of a batch that would touch the same path.
///
/// `first` and `second` are indices into the input list with `first < second`.
/// The later input is the one reported and skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    /// How the two inputs collide.
    pub kind: ConflictKind,
    /// Index of the input that claimed the path first.
    pub first: usize,
    /// Index of the later input.
    pub second: usize,
    /// The shared path.
    pub path: PathBuf,
}

impl PathConflict {
    /// Human message naming both inputs.
    pub fn message(&self, inputs: &[PathBuf]) -> String {
        let name = |idx: usize| {
            inputs
                .get(idx)
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        match self.kind {
            ConflictKind::DuplicateInput => {
                format!("Input listed more than once: {}", name(self.second))
            }
            ConflictKind::SharedDestination => format!(
                "{} and {} would both write {}",
                name(self.first),
                name(self.second),
                self.path.display()
            ),
            ConflictKind::OverwritesInput => format!(
                "{} and {} would both use {}, once as input and once as output",
                name(self.first),
                name(self.second),
                self.path.display()
            ),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Immutable configuration for one compression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Quality preset for the lossy optimizer.
    pub quality: QualityPreset,

    /// Compute candidate sizes but write nothing to the destination.
    pub dry_run: bool,

    /// Output routing mode.
    pub output: OutputRouting,

    /// Ghostscript executable, as resolved by the pre-flight check.
    pub ghostscript: PathBuf,

    /// Time budget for each external or structural stage.
    pub timeout: Duration,

    /// Keep subprocess stderr in failure reasons.
    pub diagnostics: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            quality: QualityPreset::default(),
            dry_run: false,
            output: OutputRouting::default(),
            ghostscript: PathBuf::from("gs"),
            timeout: DEFAULT_TIMEOUT,
            diagnostics: false,
        }
    }
}

impl CompressionConfig {
    /// Create a configuration with the given preset and defaults elsewhere.
    pub fn new(quality: QualityPreset) -> Self {
        Self {
            quality,
            ..Default::default()
        }
    }

    /// Resolve the destination of one input through the output routing.
    pub fn destination(&self, input: &Path) -> PathBuf {
        self.output.resolve(input)
    }

    /// Find inputs that would read or write a path another input already uses.
    ///
    /// Paths are compared lexically. Each input claims its own path and its
    /// destination; an input replacing itself in place is not a conflict.
    /// At most one conflict is reported per input.
    pub fn destination_conflicts(&self, inputs: &[PathBuf]) -> Vec<PathConflict> {
        let mut sources: HashMap<PathBuf, usize> = HashMap::new();
        let mut destinations: HashMap<PathBuf, usize> = HashMap::new();
        let mut conflicts = Vec::new();

        for (idx, input) in inputs.iter().enumerate() {
            let source = normalize(input);
            let destination = normalize(&self.destination(input));

            let conflict = if let Some(&first) = sources.get(&source) {
                Some((ConflictKind::DuplicateInput, first, source.clone()))
            } else if let Some(&first) = destinations.get(&destination) {
                Some((ConflictKind::SharedDestination, first, destination.clone()))
            } else if let Some(&first) = sources.get(&destination) {
                Some((ConflictKind::OverwritesInput, first, destination.clone()))
            } else {
                destinations
                    .get(&source)
                    .map(|&first| (ConflictKind::OverwritesInput, first, source.clone()))
            };

            if let Some((kind, first, path)) = conflict {
                conflicts.push(PathConflict {
                    kind,
                    first,
                    second: idx,
                    path,
                });
            }

            sources.entry(source).or_insert(idx);
            destinations.entry(destination).or_insert(idx);
        }

        conflicts
    }

    /// Validate the configuration against the batch it will process.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input list is empty
    /// - An explicit output path is combined with several inputs
    /// - An explicit output path equals one of the inputs
    /// - Two inputs collide (see [`destination_conflicts`](Self::destination_conflicts))
    /// - The timeout is zero
    pub fn validate(&self, inputs: &[PathBuf]) -> Result<()> {
        if inputs.is_empty() {
            bail!("No input files specified");
        }

        if self.timeout.is_zero() {
            bail!("Timeout must be greater than zero");
        }

        if let OutputRouting::Explicit(ref output) = self.output {
            if inputs.len() > 1 {
                bail!("Cannot use an explicit output path with multiple files");
            }

            if inputs.iter().any(|input| normalize(input) == normalize(output)) {
                bail!(
                    "Output file cannot be the same as the input file: {}",
                    output.display()
                );
            }
        }

        if let Some(conflict) = self.destination_conflicts(inputs).first() {
            bail!("{}", conflict.message(inputs));
        }

        Ok(())
    }

    /// Deadline for one worker: two sequential stages plus slack.
    pub fn worker_deadline(&self) -> Duration {
        self.timeout * 2 + Duration::from_secs(30)
    }
}

/// Turn a requested worker count into an actual pool size.
///
/// `0` means every available processing unit except one kept for the
/// controller, never less than one.
pub fn effective_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }

    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}
