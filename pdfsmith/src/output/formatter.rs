//! Message formatting and display.
//!
//! Status lines go to stdout and problems to stderr, so stdout stays
//! usable when piped. Colour is used only on a terminal.
//!
//! # Examples
//!
//! ```
//! use pdfsmith::output::formatter::OutputFormatter;
//!
//! let formatter = OutputFormatter::new(false, false);
//! formatter.info("Compressing 3 files...");
//! formatter.success("Done");
//! formatter.error("Something went wrong");
//! ```

use std::io::{self, IsTerminal, Write};

use crate::compress::{CompressionOutcome, StrategyResult};
use crate::io::Protection;
use crate::merge::MergeOutcome;
use crate::parallel::{BatchReport, FailureKind, FileResult};
use crate::split::SplitOutcome;
use crate::unlock::UnlockOutcome;
use crate::utils::{format_duration, format_file_size};

/// Level of output message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    /// Informational message.
    Info,
    /// Success message.
    Success,
    /// Warning message.
    Warning,
    /// Error message.
    Error,
    /// Debug/verbose message.
    Debug,
}

impl MessageLevel {
    fn prefix(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Success => "✓ ",
            Self::Warning => "⚠ ",
            Self::Error => "✗ ",
            Self::Debug => "→ ",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Info => "",
            Self::Success => "\x1b[32m",
            Self::Warning => "\x1b[33m",
            Self::Error => "\x1b[31m",
            Self::Debug => "\x1b[36m",
        }
    }

    fn to_stderr(self) -> bool {
        matches!(self, Self::Warning | Self::Error)
    }
}

/// Output formatter with configurable verbosity.
#[derive(Debug, Clone)]
pub struct OutputFormatter {
    quiet: bool,
    verbose: bool,
    colored: bool,
    interactive: bool,
}

impl OutputFormatter {
    /// Create a new output formatter.
    ///
    /// # Arguments
    ///
    /// * `quiet` - Suppress everything except warnings and errors
    /// * `verbose` - Also show per-strategy details
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            quiet,
            verbose,
            colored: Self::should_use_color(),
            interactive: io::stdout().is_terminal(),
        }
    }

    /// Create a quiet formatter (only warnings and errors).
    pub fn quiet() -> Self {
        Self::new(true, false)
    }

    /// Create a verbose formatter.
    pub fn verbose() -> Self {
        Self::new(false, true)
    }

    /// Force colour on or off.
    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    /// Force the live progress counter on or off. It is on by default
    /// only when stdout is a terminal.
    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    fn should_use_color() -> bool {
        io::stdout().is_terminal() && std::env::var_os("TERM").is_some()
    }

    /// Print an informational message. Suppressed in quiet mode.
    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.print_message(MessageLevel::Info, message);
        }
    }

    /// Print a success message. Suppressed in quiet mode.
    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.print_message(MessageLevel::Success, message);
        }
    }

    /// Print a warning message. Always displayed.
    pub fn warning(&self, message: &str) {
        self.print_message(MessageLevel::Warning, message);
    }

    /// Print an error message. Always displayed.
    pub fn error(&self, message: &str) {
        self.print_message(MessageLevel::Error, message);
    }

    /// Print a debug message. Verbose mode only.
    pub fn debug(&self, message: &str) {
        if self.verbose {
            self.print_message(MessageLevel::Debug, message);
        }
    }

    /// Render a message with its level prefix, coloured if enabled.
    pub fn render(&self, level: MessageLevel, message: &str) -> String {
        let prefix = level.prefix();
        let color = level.color();

        if self.colored && !color.is_empty() {
            format!("{color}{prefix}{message}\x1b[0m")
        } else {
            format!("{prefix}{message}")
        }
    }

    fn print_message(&self, level: MessageLevel, message: &str) {
        let line = self.render(level, message);
        if level.to_stderr() {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    /// Print a section header. Suppressed in quiet mode.
    pub fn section(&self, title: &str) {
        if !self.quiet {
            println!("\n{title}");
        }
    }

    /// Print a labelled value. Verbose mode only.
    pub fn detail(&self, label: &str, value: &str) {
        if self.verbose {
            println!("  {label}: {value}");
        }
    }

    /// Redraw the `[current/total]` counter in place. Only on a terminal,
    /// and suppressed in quiet mode.
    pub fn progress(&self, current: usize, total: usize, message: Option<&str>) {
        if self.shows_progress() {
            print!("\r{}", progress_line(current, total, message));
            io::stdout().flush().ok();

            if current == total {
                println!();
            }
        }
    }

    /// Erase the counter so a regular line can be printed over it.
    pub fn clear_line(&self) {
        if self.shows_progress() {
            print!("\r\x1b[K");
            io::stdout().flush().ok();
        }
    }

    /// Whether [`progress`](Self::progress) draws anything.
    pub fn shows_progress(&self) -> bool {
        self.interactive && !self.quiet
    }

    /// Print one file's result as it completes.
    pub fn file_result(&self, result: &FileResult) {
        let (level, line) = describe_result(result);
        match level {
            MessageLevel::Success => self.success(&line),
            MessageLevel::Warning => self.warning(&line),
            MessageLevel::Error => self.error(&line),
            MessageLevel::Debug => self.debug(&line),
            MessageLevel::Info => self.info(&line),
        }

        if let FileResult::Compressed(outcome) = result {
            for line in attempt_lines(outcome) {
                self.debug(&line);
            }
        }
    }

    /// Print a merge result.
    pub fn merge_result(&self, outcome: &MergeOutcome) {
        self.success(&merge_line(outcome));
    }

    /// Print the files written by a split.
    pub fn split_result(&self, outcomes: &[SplitOutcome]) {
        for outcome in outcomes {
            self.success(&split_line(outcome));
        }
    }

    /// Print an unlock result.
    pub fn unlock_result(&self, outcome: &UnlockOutcome) {
        let line = unlock_line(outcome);
        if outcome.was_encrypted() {
            self.success(&line);
        } else {
            self.info(&line);
        }
    }

    /// Print the end-of-run summary. Suppressed in quiet mode, except for
    /// the cancellation warning.
    pub fn summary(&self, report: &BatchReport) {
        if report.cancelled {
            self.warning("Cancelled; unfinished files were left untouched");
        }

        if self.quiet {
            return;
        }

        self.section("Summary");
        for line in summary_lines(report) {
            println!("  {line}");
        }
    }

    /// Check if output should be shown.
    pub fn should_print(&self) -> bool {
        !self.quiet
    }

    /// Check if verbose output should be shown.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if quiet mode is enabled.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }
}

impl Default for OutputFormatter {
    fn default() -> Self {
        Self::new(false, false)
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One-line description of a file's result and the level to show it at.
pub fn describe_result(result: &FileResult) -> (MessageLevel, String) {
    match result {
        FileResult::Compressed(outcome) if outcome.improved() => {
            let mut line = format!(
                "{}: {} → {} (-{}%, {})",
                file_name(&outcome.input_path),
                format_file_size(outcome.original_size),
                format_file_size(outcome.final_size),
                outcome.reduction_percent(),
                outcome.strategy_name()
            );
            if !outcome.written {
                line.push_str(" [dry run]");
            }
            (MessageLevel::Success, line)
        }
        FileResult::Compressed(outcome) => (
            MessageLevel::Info,
            format!(
                "{}: {}, kept original (no smaller candidate)",
                file_name(&outcome.input_path),
                format_file_size(outcome.original_size)
            ),
        ),
        FileResult::Failed(failure) => {
            let level = match failure.kind {
                FailureKind::Cancelled => MessageLevel::Warning,
                FailureKind::Input | FailureKind::WorkerFault => MessageLevel::Error,
            };
            (
                level,
                format!("{}: {}", file_name(&failure.input_path), failure.reason),
            )
        }
    }
}

/// The progress counter text, without the carriage return.
pub fn progress_line(current: usize, total: usize, message: Option<&str>) -> String {
    match message {
        Some(msg) => format!("  [{current}/{total}] {msg}"),
        None => format!("  [{current}/{total}]"),
    }
}

/// One-line description of a merge.
pub fn merge_line(outcome: &MergeOutcome) -> String {
    format!(
        "{}: {} files, {} pages, {}",
        file_name(&outcome.output_path),
        outcome.inputs.len(),
        outcome.page_count,
        format_file_size(outcome.output_size)
    )
}

/// One-line description of a written split file.
pub fn split_line(outcome: &SplitOutcome) -> String {
    let pages = if outcome.pages.len() == 1 { "page" } else { "pages" };
    format!(
        "{}: {} {pages} from {}, {}",
        file_name(&outcome.output_path),
        outcome.pages.len(),
        file_name(&outcome.input_path),
        format_file_size(outcome.output_size)
    )
}

/// One-line description of an unlock.
pub fn unlock_line(outcome: &UnlockOutcome) -> String {
    let input = file_name(&outcome.input_path);
    match outcome.protection {
        Protection::None => format!("{input}: not encrypted, skipped"),
        Protection::OwnerOnly => {
            format!("{input} → {} (restrictions removed)", file_name(&outcome.output_path))
        }
        Protection::Password => {
            format!("{input} → {} (password removed)", file_name(&outcome.output_path))
        }
    }
}

/// Per-strategy lines for verbose output.
pub fn attempt_lines(outcome: &CompressionOutcome) -> Vec<String> {
    outcome
        .attempts
        .iter()
        .map(|attempt| match &attempt.result {
            StrategyResult::Success { output_size, .. } => {
                format!("{}: {}", attempt.strategy, format_file_size(*output_size))
            }
            StrategyResult::Failure { reason } => {
                format!("{}: failed ({reason})", attempt.strategy)
            }
        })
        .collect()
}

/// Lines of the batch summary.
pub fn summary_lines(report: &BatchReport) -> Vec<String> {
    let totals = &report.totals;
    let mut lines = vec![format!("Files processed: {}", totals.files_processed)];

    if totals.files_failed > 0 {
        lines.push(format!("Files failed:    {}", totals.files_failed));
    }

    lines.push(format!(
        "Original size:   {}",
        format_file_size(totals.original_bytes)
    ));
    lines.push(format!(
        "Final size:      {}",
        format_file_size(totals.final_bytes)
    ));
    lines.push(format!(
        "Saved:           {} ({}%)",
        format_file_size(totals.bytes_saved),
        totals.reduction_percent()
    ));
    lines.push(format!("Elapsed:         {}", format_duration(report.elapsed)));
    lines
}
