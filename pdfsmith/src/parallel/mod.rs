//! Batch processing with isolated workers.
//!
//! The [`ParallelExecutor`] hands each input to a worker (a child process
//! in production, a task in tests), keeps at most N workers alive, and
//! gathers a [`BatchReport`] in input order.

pub mod executor;
pub mod report;
pub mod worker;

pub use executor::{ParallelExecutor, WorkerCommand, WorkerMode};
pub use report::{BatchReport, BatchTotals, FailureKind, FileFailure, FileResult};
pub use worker::{WorkerJob, WorkerReply};
