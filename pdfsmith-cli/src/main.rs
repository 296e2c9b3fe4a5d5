//! pdfsmith - Shrink PDF files by racing several compression strategies.

mod cli;

use clap::Parser;
use std::path::Path;
use std::process;
use std::time::Duration;

use crate::cli::{Cli, Command, CompressArgs, MergeArgs, SplitArgs, UnlockArgs};
use pdfsmith::compress::Ghostscript;
use pdfsmith::config::OutputRouting;
use pdfsmith::error::PdfSmithError;
use pdfsmith::merge::{Merger, group_by_base_name};
use pdfsmith::output::{OutputFormatter, report_json};
use pdfsmith::parallel::{FileResult, ParallelExecutor, WorkerCommand, WorkerMode, worker};
use pdfsmith::split::Splitter;
use pdfsmith::unlock::Unlocker;
use pdfsmith::utils::format_file_size;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Worker => {
            init_logging(log::LevelFilter::Warn);
            worker::serve(tokio::io::stdin(), tokio::io::stdout())
                .await
                .map(|()| 0)
        }
        Command::Compress(args) => {
            init_logging(log_level(args.verbose));
            run(args).await
        }
        Command::Merge(args) => {
            init_logging(log_level(args.verbose));
            run_merge(args).await
        }
        Command::Split(args) => {
            init_logging(log_level(args.verbose));
            run_split(args).await
        }
        Command::Unlock(args) => {
            init_logging(log_level(args.verbose));
            run_unlock(args).await
        }
    };

    match result {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(err.exit_code());
        }
    }
}

fn log_level(verbose: bool) -> log::LevelFilter {
    if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    }
}

async fn create_output_dir(dir: &Path) -> Result<(), PdfSmithError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| PdfSmithError::FailedToWrite {
            path: dir.to_path_buf(),
            source,
        })
}

/// `RUST_LOG` overrides the level chosen from the flags.
fn init_logging(level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp(None)
        .init();
}

/// Compress every input and return the process exit code.
async fn run(args: CompressArgs) -> Result<i32, PdfSmithError> {
    args.validate()?;
    let mut config = args.to_config()?;

    config.ghostscript = Ghostscript::locate(args.ghostscript.as_deref())?;

    if let OutputRouting::Directory(ref dir) = config.output
        && !config.dry_run
    {
        create_output_dir(dir).await?;
    }

    let formatter = if args.json {
        OutputFormatter::quiet()
    } else {
        OutputFormatter::new(args.quiet, args.verbose)
    };

    let executor = ParallelExecutor::new(
        WorkerMode::Process(WorkerCommand::current_exe()?),
        args.jobs,
    );

    let total = args.inputs.len();
    if formatter.should_print() {
        formatter.section(&format!("{} v{}", pdfsmith::NAME, pdfsmith::VERSION));
        formatter.detail("Quality", &config.quality.to_string());
        formatter.detail("Output", &config.output.describe());
        formatter.detail("Workers", &executor.workers().min(total).to_string());
        formatter.detail("Ghostscript", &config.ghostscript.display().to_string());
        if config.dry_run {
            formatter.info("Dry run: nothing will be written");
        }
        formatter.info(&format!("Compressing {total} file(s)..."));
    }

    let mut done = 0;
    let mut saved = 0u64;
    let report = executor
        .run_until(
            &args.inputs,
            &config,
            |_, result| {
                formatter.clear_line();
                formatter.file_result(result);
                done += 1;
                if let FileResult::Compressed(outcome) = result {
                    saved += outcome.bytes_saved();
                }
                let status = format!("{} saved", format_file_size(saved));
                formatter.progress(done, total, Some(&status));
            },
            async {
                if tokio::signal::ctrl_c().await.is_err() {
                    log::warn!("cannot listen for Ctrl-C; cancellation disabled");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await;

    if args.json {
        println!("{}", report_json(&report)?);
    } else if total > 1 || report.cancelled {
        formatter.summary(&report);
    }

    if report.cancelled {
        return Ok(PdfSmithError::Cancelled.exit_code());
    }

    if report.totals.files_processed == 0 {
        return Ok(1);
    }

    Ok(0)
}

/// Merge the inputs, or each group of them, and return the exit code.
async fn run_merge(args: MergeArgs) -> Result<i32, PdfSmithError> {
    args.validate()?;
    let formatter = OutputFormatter::new(args.quiet, args.verbose);
    let merger = Merger::new();

    if !args.grouped {
        let output = args.output_path();
        formatter.info(&format!("Merging {} files...", args.files.len()));
        let outcome = merger.merge(&args.files, &output).await?;
        formatter.merge_result(&outcome);
        return Ok(0);
    }

    let groups = group_by_base_name(&args.files);
    if groups.is_empty() {
        formatter.warning("No files share a base name; nothing to merge");
        return Ok(1);
    }

    let mut failed = 0;
    for group in &groups {
        formatter.debug(&format!(
            "{}: {} files",
            group.base_name,
            group.inputs.len()
        ));
        match merger.merge(&group.inputs, &group.output).await {
            Ok(outcome) => formatter.merge_result(&outcome),
            Err(err) => {
                formatter.error(&format!("{}: {err}", group.base_name));
                failed += 1;
            }
        }
    }

    Ok(if failed > 0 { 1 } else { 0 })
}

/// Extract the selected pages and return the exit code.
async fn run_split(args: SplitArgs) -> Result<i32, PdfSmithError> {
    let selection = args.selection()?;
    let formatter = OutputFormatter::new(args.quiet, args.verbose);
    let splitter = Splitter::new();

    if args.individual {
        let dir = args.individual_dir();
        let outcomes = splitter
            .split_individual(&args.file, &selection, &dir)
            .await?;
        formatter.split_result(&outcomes);
        formatter.success(&format!("Extracted {} pages", outcomes.len()));
    } else {
        if let Some(ref dir) = args.output_dir {
            create_output_dir(dir).await?;
        }
        let outcome = splitter
            .split(&args.file, &selection, &args.output_path())
            .await?;
        formatter.split_result(std::slice::from_ref(&outcome));
    }

    Ok(0)
}

/// Unlock every input and return the exit code.
async fn run_unlock(args: UnlockArgs) -> Result<i32, PdfSmithError> {
    args.validate()?;
    let formatter = OutputFormatter::new(args.quiet, args.verbose);

    if let Some(ref dir) = args.output_dir {
        create_output_dir(dir).await?;
    }

    // Only password-protected files need Ghostscript.
    let ghostscript = match Ghostscript::locate(args.ghostscript.as_deref()) {
        Ok(program) => Some(Ghostscript::new(program, Duration::from_secs(args.timeout))),
        Err(err) => {
            log::debug!("{err}");
            None
        }
    };
    let unlocker = Unlocker::new(ghostscript);

    let mut failed = 0;
    for file in &args.files {
        let destination = args.destination(file);
        match unlocker
            .unlock(file, &destination, args.password.as_deref())
            .await
        {
            Ok(outcome) => formatter.unlock_result(&outcome),
            Err(err) => {
                formatter.error(&format!("{}: {err}", file.display()));
                failed += 1;
            }
        }
    }

    Ok(if failed > 0 { 1 } else { 0 })
}
