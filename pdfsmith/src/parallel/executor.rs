//! Bounded parallel execution of per-file compression.

use futures::stream::{self, StreamExt};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::report::{BatchReport, FailureKind, FileFailure, FileResult};
use super::worker::{self, WorkerJob, WorkerReply};
use crate::compress::orchestrator::scratch_dir;
use crate::config::{CompressionConfig, effective_workers};
use crate::error::{PdfSmithError, Result};
use crate::io::remove_staged;
use crate::utils::describe_exit;

/// How a worker is started.
#[derive(Debug, Clone)]
pub enum WorkerMode {
    /// Run each file in a task of the current process.
    ///
    /// Panics are contained, but a crash inside native code takes the whole
    /// process down. Meant for tests and embedding.
    InProcess,
    /// Run each file in a fresh child process.
    Process(WorkerCommand),
}

/// Command line that starts one worker process.
///
/// The worker reads a JSON [`WorkerJob`] on stdin and writes a JSON
/// [`WorkerReply`] on stdout.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    /// Create a worker command.
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Re-run the current executable with its `worker` subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if the path of the running executable is unknown.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().map_err(|e| {
            PdfSmithError::other(format!("cannot locate the running executable: {e}"))
        })?;
        Ok(Self::new(program, ["worker"]))
    }

    /// Program started for each worker.
    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(
        &self,
        job: &WorkerJob,
        deadline: Duration,
    ) -> std::result::Result<WorkerReply, String> {
        let payload = serde_json::to_vec(job).map_err(|e| format!("cannot encode job: {e}"))?;

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| format!("cannot start worker {}: {e}", self.program.display()))?;
        // Declared after `child`, so the group is killed before the leader is reaped.
        let group = ProcessGroup::led_by(child.id());

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| "worker stdin unavailable".to_string())?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| "worker stdout unavailable".to_string())?;

        let exchange = async {
            if let Err(err) = stdin.write_all(&payload).await {
                log::debug!("worker closed its input early: {err}");
            }
            drop(stdin);

            let mut reply = Vec::new();
            let (read, status) = tokio::join!(stdout.read_to_end(&mut reply), child.wait());
            read?;
            status.map(|status| (status, reply))
        };

        let (status, reply) = match timeout(deadline, exchange).await {
            Ok(Ok(exchanged)) => exchanged,
            Ok(Err(err)) => return Err(format!("lost contact with worker: {err}")),
            Err(_) => {
                return Err(format!(
                    "worker exceeded its {}s deadline and was killed",
                    deadline.as_secs()
                ));
            }
        };

        if !status.success() {
            return Err(format!(
                "worker exited abnormally ({})",
                describe_exit(status)
            ));
        }
        group.release();

        serde_json::from_slice(&reply).map_err(|e| format!("unreadable worker reply: {e}"))
    }
}

/// Kills a worker's whole process group when dropped.
///
/// Each worker leads its own group, so Ghostscript children it started die
/// with it instead of being orphaned.
#[cfg_attr(not(unix), allow(dead_code))]
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    fn led_by(pid: Option<u32>) -> Self {
        Self(pid)
    }

    /// The worker exited cleanly and its children with it.
    fn release(mut self) {
        self.0 = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.0.and_then(|pid| libc::pid_t::try_from(pid).ok()) {
            // SAFETY: killpg takes plain integers and only sends a signal.
            unsafe {
                libc::killpg(pgid, libc::SIGKILL);
            }
        }
    }
}

/// Aborts the task when dropped, so cancelling the batch stops in-process work.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_in_process(
    job: WorkerJob,
    deadline: Duration,
) -> std::result::Result<WorkerReply, String> {
    let mut task = AbortOnDrop(tokio::spawn(async move { worker::run_job(&job).await }));

    match timeout(deadline, &mut task.0).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(err)) if err.is_panic() => Err("worker panicked".to_string()),
        Ok(Err(err)) => Err(format!("worker task failed: {err}")),
        Err(_) => Err(format!("worker exceeded its {}s deadline", deadline.as_secs())),
    }
}

/// Runs the per-file compression over a batch with bounded concurrency.
///
/// Every file gets its own worker and scratch directory. A failing worker
/// becomes a [`FileFailure`] for that file; the rest of the batch carries on.
/// Results are reported in input order regardless of completion order.
#[derive(Debug, Clone)]
pub struct ParallelExecutor {
    mode: WorkerMode,
    workers: usize,
    deadline: Option<Duration>,
}

impl ParallelExecutor {
    /// Create an executor. A `worker_count` of 0 picks a default from the
    /// machine's parallelism.
    pub fn new(mode: WorkerMode, worker_count: usize) -> Self {
        Self {
            mode,
            workers: effective_workers(worker_count),
            deadline: None,
        }
    }

    /// Override the per-worker deadline derived from the configuration.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Maximum number of concurrent workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every input. `on_result` sees each result as it completes,
    /// together with the input's index.
    pub async fn run<F>(
        &self,
        inputs: &[PathBuf],
        config: &CompressionConfig,
        on_result: F,
    ) -> BatchReport
    where
        F: FnMut(usize, &FileResult),
    {
        self.run_until(inputs, config, on_result, std::future::pending::<()>())
            .await
    }

    /// Like [`run`](Self::run), but stop as soon as `shutdown` completes.
    ///
    /// Running workers are killed with their process groups, their scratch
    /// directories and staging files removed, and every unfinished input is
    /// reported as [`FailureKind::Cancelled`].
    ///
    /// An input that collides with an earlier one (see
    /// [`CompressionConfig::destination_conflicts`]) is never started and is
    /// reported as a [`FailureKind::Input`] failure.
    pub async fn run_until<F, S>(
        &self,
        inputs: &[PathBuf],
        config: &CompressionConfig,
        mut on_result: F,
        shutdown: S,
    ) -> BatchReport
    where
        F: FnMut(usize, &FileResult),
        S: Future<Output = ()>,
    {
        let started = Instant::now();
        let mut slots: Vec<Option<FileResult>> = inputs.iter().map(|_| None).collect();
        let mut cancelled = false;

        for conflict in config.destination_conflicts(inputs) {
            let input = &inputs[conflict.second];
            let reason = conflict.message(inputs);
            log::warn!("{}: {}", input.display(), reason);

            let result = FileResult::Failed(FileFailure::new(input, FailureKind::Input, reason));
            on_result(conflict.second, &result);
            slots[conflict.second] = Some(result);
        }
        let pending: Vec<usize> = (0..inputs.len()).filter(|&idx| slots[idx].is_none()).collect();

        log::debug!(
            "processing {} file(s) with up to {} worker(s)",
            pending.len(),
            self.workers
        );

        {
            let jobs = pending.into_iter().map(|idx| {
                let input = &inputs[idx];
                async move { (idx, self.process(input, config).await) }
            });
            let mut results = stream::iter(jobs).buffer_unordered(self.workers);

            tokio::pin!(shutdown);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => {
                        log::warn!("cancellation requested, stopping workers");
                        cancelled = true;
                        break;
                    }
                    next = results.next() => match next {
                        Some((idx, result)) => {
                            on_result(idx, &result);
                            slots[idx] = Some(result);
                        }
                        None => break,
                    },
                }
            }
        }

        let results = slots
            .into_iter()
            .zip(inputs)
            .map(|(slot, input)| {
                slot.unwrap_or_else(|| {
                    if !config.dry_run {
                        remove_staged(&config.destination(input));
                    }
                    FileResult::Failed(FileFailure::cancelled(input))
                })
            })
            .collect();

        BatchReport::new(results, started.elapsed(), cancelled)
    }

    async fn process(&self, input: &Path, config: &CompressionConfig) -> FileResult {
        let scratch = match scratch_dir() {
            Ok(dir) => dir,
            Err(err) => {
                return FileResult::Failed(FileFailure::new(
                    input,
                    FailureKind::WorkerFault,
                    format!("cannot create scratch directory: {err}"),
                ));
            }
        };

        let job = WorkerJob {
            input: input.to_path_buf(),
            scratch: scratch.path().to_path_buf(),
            config: config.clone(),
        };
        let deadline = self.deadline.unwrap_or_else(|| config.worker_deadline());

        let reply = match &self.mode {
            WorkerMode::InProcess => run_in_process(job, deadline).await,
            WorkerMode::Process(command) => command.run(&job, deadline).await,
        };

        match reply {
            Ok(WorkerReply::Done { outcome }) => FileResult::Compressed(outcome),
            Ok(WorkerReply::Failed { reason }) => {
                log::warn!("{}: {}", input.display(), reason);
                FileResult::Failed(FileFailure::new(input, FailureKind::Input, reason))
            }
            Err(reason) => {
                log::warn!("{}: {}", input.display(), reason);
                if !config.dry_run {
                    remove_staged(&config.destination(input));
                }
                FileResult::Failed(FileFailure::new(input, FailureKind::WorkerFault, reason))
            }
        }
    }
}
