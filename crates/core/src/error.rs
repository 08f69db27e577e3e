//! Error types for job control.
//!
//! Failures of the domain runtime never surface here; they end up as a
//! `Failed` status and an error log entry of the job concerned. These errors
//! report misuse of the job API by the caller.

use ot_protocol::runner_status::RunnerStatus;
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by job control operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// No job is registered under the given id.
    #[error("Job {0} not found")]
    JobNotFound(Uuid),

    /// The operation requires a job without a live worker.
    #[error("Job {0} is running")]
    JobIsRunning(Uuid),

    /// The procedure was rejected before any worker was spawned.
    #[error("Submit failure: {0}")]
    SubmitFailure(String),

    /// Sleep time of a paced run must be positive.
    #[error("Sleep time must be positive, got {0} msec")]
    InvalidSleepTime(u64),

    /// Bounds-checked log access failed.
    #[error("Log index {index} out of range, log has {len} events")]
    LogIndexOutOfRange { index: usize, len: usize },

    /// The instruction index is not part of the job's procedure.
    #[error("Instruction {index} out of range for job {job_id}")]
    InstructionOutOfRange { job_id: Uuid, index: u32 },

    /// The user request was already answered, cancelled, or never existed.
    #[error("No pending request {request_id} for job {job_id}")]
    RequestNotFound { job_id: Uuid, request_id: u64 },

    /// A user answer was rejected: input that is not JSON, or a choice
    /// index outside the offered options.
    #[error("Invalid user input: {0}")]
    InvalidInput(String),

    /// The job did not reach the awaited state in time.
    #[error("Timed out waiting for job {job_id}, status is {status}")]
    Timeout { job_id: Uuid, status: RunnerStatus },

    /// The OS refused to start a worker thread.
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Type alias for Result with JobError.
pub type JobResult<T> = Result<T, JobError>;

/// Misuse of a one-shot [`RequestHandler`](crate::request::RequestHandler).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("Request handler was already answered")]
    AlreadyAnswered,

    #[error("Request handler was already consumed")]
    AlreadyConsumed,
}
