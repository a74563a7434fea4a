//! rubricon-jobs — background work for the diagnostic platform.
//!
//! Scoring sweeps, report generation, and item-bank imports run off the
//! request path. A handler enqueues a [`rubricon_core::model::JobKind`]
//! and gets a job id back; the worker retries transient failures with
//! exponential backoff and mirrors progress onto the report or batch
//! the job operates on.

pub mod error;
pub mod handlers;
pub mod queue;

pub use error::JobError;
pub use queue::{run_job, JobContext, JobQueue, JobWorker, JobsConfig};
