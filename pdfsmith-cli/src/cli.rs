//! CLI argument parsing for pdfsmith.
//!
//! This module defines the command-line interface using `clap`. It is also
//! compiled by `build.rs` to render the man page, so it must only depend on
//! `clap` and the `pdfsmith` library.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pdfsmith::config::{CompressionConfig, OutputRouting, QualityPreset};
use pdfsmith::error::{PdfSmithError, Result};
use pdfsmith::merge::default_merge_output;
use pdfsmith::split::{PageSelection, split_output_path};
use pdfsmith::unlock::unlock_output_path;

/// Shrink PDF files by racing several compression strategies.
///
/// Every file is tried with a lossless structural rewrite, a lossy
/// Ghostscript pass, and both combined. The smallest result wins, and a
/// file is never made larger than it was.
#[derive(Parser, Debug)]
#[command(name = "pdfsmith")]
#[command(version)]
#[command(about = "Shrink PDF files by racing several compression strategies", long_about = None)]
#[command(author)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compress one or more PDF files
    Compress(CompressArgs),

    /// Merge PDF files into one
    Merge(MergeArgs),

    /// Extract pages from a PDF
    Split(SplitArgs),

    /// Remove passwords and restrictions from PDF files
    Unlock(UnlockArgs),

    /// Process one job read from stdin (used internally)
    #[command(hide = true)]
    Worker,
}

/// Arguments of `pdfsmith compress`.
#[derive(Args, Debug)]
pub struct CompressArgs {
    /// Input PDF files
    ///
    /// Examples:
    ///   pdfsmith compress scan.pdf
    ///   pdfsmith compress *.pdf -d small/
    #[arg(required = true, value_name = "FILE")]
    pub inputs: Vec<PathBuf>,

    /// Write the result to this file (single input only)
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["output_dir", "in_place"])]
    pub output: Option<PathBuf>,

    /// Write results into this directory as <name>.compressed.pdf
    ///
    /// The directory is created if it does not exist.
    #[arg(short = 'd', long, value_name = "DIR", conflicts_with = "in_place")]
    pub output_dir: Option<PathBuf>,

    /// Replace each input with its compressed version
    ///
    /// An input is only replaced when a strictly smaller result was found.
    #[arg(short, long)]
    pub in_place: bool,

    /// Quality preset for the lossy pass
    ///
    /// - screen:   72 dpi, smallest files
    /// - ebook:    150 dpi, balanced (default)
    /// - printer:  300 dpi
    /// - prepress: 300 dpi, colour preserving
    #[arg(short = 'Q', long, value_name = "PRESET", default_value = "ebook")]
    #[arg(value_parser = ["screen", "ebook", "printer", "prepress"], ignore_case = true)]
    pub quality: String,

    /// Number of parallel workers (0 = number of CPUs minus one)
    #[arg(short, long, value_name = "N", default_value_t = 0)]
    pub jobs: usize,

    /// Dry run - report what would be saved without writing anything
    #[arg(short = 'n', long, conflicts_with_all = ["output", "in_place"])]
    pub dry_run: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose output - show every strategy's result and debug logs
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to the Ghostscript executable
    ///
    /// By default gs, gswin64c and gswin32c are searched on PATH.
    #[arg(long = "gs", value_name = "PATH", env = "PDFSMITH_GS")]
    pub ghostscript: Option<PathBuf>,

    /// Time limit in seconds for each compression stage
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub timeout: u64,

    /// Print the batch report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl CompressArgs {
    /// Validate argument combinations clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if `--output` is given with several inputs, or a
    /// numeric argument is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(PdfSmithError::invalid_config("No input files specified"));
        }

        if self.output.is_some() && self.inputs.len() > 1 {
            return Err(PdfSmithError::invalid_config(
                "--output can only be used with a single input file; use --output-dir instead",
            ));
        }

        if self.timeout == 0 {
            return Err(PdfSmithError::invalid_config(
                "Timeout must be at least 1 second",
            ));
        }

        Ok(())
    }

    /// Output routing selected by the flags.
    pub fn routing(&self) -> OutputRouting {
        if let Some(ref output) = self.output {
            OutputRouting::Explicit(output.clone())
        } else if let Some(ref dir) = self.output_dir {
            OutputRouting::Directory(dir.clone())
        } else if self.in_place {
            OutputRouting::InPlace
        } else {
            OutputRouting::Suffixed
        }
    }

    /// Convert the arguments into a validated configuration.
    ///
    /// The Ghostscript path is taken as given; the pre-flight check in
    /// `main` replaces it with the located executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the quality preset is unknown or the resulting
    /// configuration does not fit the inputs.
    pub fn to_config(&self) -> Result<CompressionConfig> {
        let quality = QualityPreset::from_str(&self.quality)?;

        let config = CompressionConfig {
            quality,
            dry_run: self.dry_run,
            output: self.routing(),
            ghostscript: self
                .ghostscript
                .clone()
                .unwrap_or_else(|| PathBuf::from("gs")),
            timeout: Duration::from_secs(self.timeout),
            diagnostics: self.verbose,
        };

        config.validate(&self.inputs).map_err(|e| {
            PdfSmithError::invalid_config(format!("Configuration validation failed: {e}"))
        })?;

        Ok(config)
    }
}

/// Arguments of `pdfsmith merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Input PDF files, merged in the order given
    ///
    /// Examples:
    ///   pdfsmith merge cover.pdf body.pdf -o book.pdf
    ///   pdfsmith merge -g scan-1.pdf scan-2.pdf memo_1.pdf memo_2.pdf
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Output file (default: merged.pdf next to the first input)
    #[arg(short, long, value_name = "FILE", conflicts_with = "grouped")]
    pub output: Option<PathBuf>,

    /// Merge files sharing a base name (scan-1, scan_2, ...) into
    /// <base>.merged.pdf, one output per group
    #[arg(short, long)]
    pub grouped: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose output with debug logs
    #[arg(short, long)]
    pub verbose: bool,
}

impl MergeArgs {
    /// Validate argument combinations clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if fewer than two files are given, or the output
    /// is one of the inputs.
    pub fn validate(&self) -> Result<()> {
        if !self.grouped && self.files.len() < 2 {
            return Err(PdfSmithError::invalid_config(
                "At least two input files are needed to merge",
            ));
        }

        let output = self.output_path();
        if !self.grouped && self.files.iter().any(|f| *f == output) {
            return Err(PdfSmithError::invalid_config(format!(
                "Output {} is also an input",
                output.display()
            )));
        }

        Ok(())
    }

    /// Destination of an ungrouped merge.
    pub fn output_path(&self) -> PathBuf {
        match (&self.output, self.files.first()) {
            (Some(output), _) => output.clone(),
            (None, Some(first)) => default_merge_output(first),
            (None, None) => PathBuf::from("merged.pdf"),
        }
    }
}

/// Arguments of `pdfsmith split`.
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Input PDF file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Pages to extract: 1,3,5-10 or all, odd, even
    #[arg(short, long, value_name = "PAGES")]
    pub pages: String,

    /// Output file (default: <name>.split.pdf)
    #[arg(short, long, value_name = "FILE", conflicts_with = "individual")]
    pub output: Option<PathBuf>,

    /// Directory for the output; created if it does not exist
    #[arg(short = 'd', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write each page to its own file, <name>_page_NNN.pdf
    #[arg(short, long)]
    pub individual: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose output with debug logs
    #[arg(short, long)]
    pub verbose: bool,
}

impl SplitArgs {
    /// Parse the page selection.
    ///
    /// # Errors
    ///
    /// Returns [`PdfSmithError::InvalidPageRange`] for a malformed selection.
    pub fn selection(&self) -> Result<PageSelection> {
        PageSelection::parse(&self.pages)
    }

    /// Destination of a combined split.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| split_output_path(&self.file, self.output_dir.as_deref()))
    }

    /// Directory for one-file-per-page output.
    pub fn individual_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(|| self.file.parent().map(PathBuf::from))
            .unwrap_or_default()
    }
}

/// Arguments of `pdfsmith unlock`.
#[derive(Args, Debug)]
pub struct UnlockArgs {
    /// Encrypted PDF files
    #[arg(required = true, value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Output file (single input only; default: <name>.unlocked.pdf)
    #[arg(short, long, value_name = "FILE", conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    /// Directory for the outputs; created if it does not exist
    #[arg(short = 'd', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Password that opens the files
    ///
    /// Not needed for files that only restrict printing or copying.
    #[arg(short, long, value_name = "PASSWORD", env = "PDFSMITH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path to the Ghostscript executable, used for password-protected files
    #[arg(long = "gs", value_name = "PATH", env = "PDFSMITH_GS")]
    pub ghostscript: Option<PathBuf>,

    /// Time limit in seconds for each Ghostscript run
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub timeout: u64,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose output with debug logs
    #[arg(short, long)]
    pub verbose: bool,
}

impl UnlockArgs {
    /// Validate argument combinations clap cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error if `--output` is given with several inputs.
    pub fn validate(&self) -> Result<()> {
        if self.output.is_some() && self.files.len() > 1 {
            return Err(PdfSmithError::invalid_config(
                "--output can only be used with a single input file; use --output-dir instead",
            ));
        }

        if self.timeout == 0 {
            return Err(PdfSmithError::invalid_config(
                "Timeout must be at least 1 second",
            ));
        }

        Ok(())
    }

    /// Destination for `input`.
    pub fn destination(&self, input: &std::path::Path) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| unlock_output_path(input, self.output_dir.as_deref()))
    }
}
