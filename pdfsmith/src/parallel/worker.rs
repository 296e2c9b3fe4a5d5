//! Worker side of the executor protocol.
//!
//! A worker receives one [`WorkerJob`] as JSON on its input, compresses the
//! file, and answers with one [`WorkerReply`] as JSON on its output. The
//! same function backs both worker modes, so a subprocess worker and an
//! in-process worker produce identical outcomes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::compress::{CompressionOutcome, Compressor};
use crate::config::CompressionConfig;
use crate::error::Result;

/// One unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerJob {
    /// File to compress.
    pub input: PathBuf,
    /// Private scratch directory, owned by the controller.
    pub scratch: PathBuf,
    /// Run configuration.
    pub config: CompressionConfig,
}

/// A worker's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum WorkerReply {
    /// The file was processed.
    Done {
        /// What happened to it.
        outcome: CompressionOutcome,
    },
    /// The file could not be read or written.
    Failed {
        /// Why.
        reason: String,
    },
}

/// Process one job.
pub async fn run_job(job: &WorkerJob) -> WorkerReply {
    match Compressor::new()
        .compress_in(&job.input, &job.scratch, &job.config)
        .await
    {
        Ok(outcome) => WorkerReply::Done { outcome },
        Err(err) => WorkerReply::Failed {
            reason: err.to_string(),
        },
    }
}

/// Read one job from `reader`, run it, and write the reply to `writer`.
///
/// # Errors
///
/// Returns an error if the job cannot be read or decoded, or the reply
/// cannot be written. Compression problems are part of the reply.
pub async fn serve<R, W>(mut reader: R, mut writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw).await?;
    let job: WorkerJob = serde_json::from_slice(&raw)?;

    log::debug!("worker {} starting {}", std::process::id(), job.input.display());

    let reply = run_job(&job).await;

    let mut encoded = serde_json::to_vec(&reply)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
