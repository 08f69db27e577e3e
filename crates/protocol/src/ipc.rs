//! Communication protocol between the GUI and the job core.
//!
//! The protocol follows an Operation/Event pattern:
//! - `Op`: commands sent from the GUI to the job manager
//! - `Event`: notifications sent from the job manager to the GUI
//!
//! Events are produced on the thread owning the job manager, after the
//! domain events of the worker threads have been drained. Events of one job
//! arrive in the order the domain produced them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::log_models::LogEvent;
use crate::procedure_models::{InstructionStatus, ProcedureDefinition};
use crate::request_models::{UserChoiceArgs, UserChoiceResult, UserInputArgs, UserInputResult};
use crate::runner_status::RunnerStatus;

/// Operations sent from the GUI to the job manager.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "changeDelay",
///   "payload": {
///     "job_id": "uuid-here",
///     "msec": 200
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Op {
    /// Register a procedure as a new job without starting it.
    SubmitJob { procedure: ProcedureDefinition },

    /// Start a job, or resume it when paused.
    StartJob {
        #[ts(type = "string")]
        job_id: Uuid,
    },

    /// Hold the job at its next wait point.
    PauseJob {
        #[ts(type = "string")]
        job_id: Uuid,
    },

    /// Release exactly one step of a paused job.
    StepJob {
        #[ts(type = "string")]
        job_id: Uuid,
    },

    /// Request a cooperative halt.
    StopJob {
        #[ts(type = "string")]
        job_id: Uuid,
    },

    /// Bring a finished job back to its initial state.
    ResetJob {
        #[ts(type = "string")]
        job_id: Uuid,
    },

    /// Remove a job that is not running.
    RemoveJob {
        #[ts(type = "string")]
        job_id: Uuid,
    },

    /// Change the delay between steps; zero means no delay.
    ChangeDelay {
        #[ts(type = "string")]
        job_id: Uuid,
        msec: u64,
    },

    /// Set or clear a breakpoint on an instruction.
    ToggleBreakpoint {
        #[ts(type = "string")]
        job_id: Uuid,
        instruction_index: u32,
        enabled: bool,
    },

    /// Select the job whose active-instruction updates are forwarded.
    SetActiveJob {
        #[ts(type = "string | null")]
        job_id: Option<Uuid>,
    },

    /// Answer a pending user-choice request.
    AnswerUserChoice {
        #[ts(type = "string")]
        job_id: Uuid,
        request_id: u64,
        result: UserChoiceResult,
    },

    /// Answer a pending user-input request.
    AnswerUserInput {
        #[ts(type = "string")]
        job_id: Uuid,
        request_id: u64,
        result: UserInputResult,
    },

    /// Stop all jobs and join their workers.
    Shutdown,
}

/// Notifications sent from the job manager to the GUI.
///
/// Uses tagged enum serialization for TypeScript compatibility:
/// ```json
/// {
///   "type": "jobStatusChanged",
///   "payload": {
///     "job_id": "uuid-here",
///     "status": "RUNNING"
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum Event {
    /// A job has been registered.
    JobSubmitted {
        #[ts(type = "string")]
        job_id: Uuid,
        procedure_name: String,
    },

    /// A job's runner status has changed.
    JobStatusChanged {
        #[ts(type = "string")]
        job_id: Uuid,
        status: RunnerStatus,
    },

    /// An instruction of the job's procedure has changed its status.
    InstructionStatusChanged {
        #[ts(type = "string")]
        job_id: Uuid,
        index: u32,
        name: String,
        status: InstructionStatus,
    },

    /// A workspace variable has a new value.
    VariableUpdated {
        #[ts(type = "string")]
        job_id: Uuid,
        name: String,
        /// New value as JSON.
        value: String,
        connected: bool,
    },

    /// The set of instructions about to execute has changed.
    ///
    /// Only sent for the active job.
    ActiveInstructionsChanged {
        #[ts(type = "string")]
        job_id: Uuid,
        indices: Vec<u32>,
    },

    /// Execution was held at a breakpoint.
    BreakpointHit {
        #[ts(type = "string")]
        job_id: Uuid,
        index: u32,
    },

    /// A log event was appended to the job log.
    LogAppended {
        #[ts(type = "string")]
        job_id: Uuid,
        event: LogEvent,
    },

    /// The job log was cleared.
    LogCleared {
        #[ts(type = "string")]
        job_id: Uuid,
    },

    /// The domain waits for the operator to pick an option.
    UserChoiceRequested {
        #[ts(type = "string")]
        job_id: Uuid,
        request_id: u64,
        args: UserChoiceArgs,
    },

    /// The domain waits for the operator to enter a value.
    UserInputRequested {
        #[ts(type = "string")]
        job_id: Uuid,
        request_id: u64,
        args: UserInputArgs,
    },

    /// A job has been removed from the manager.
    JobRemoved {
        #[ts(type = "string")]
        job_id: Uuid,
    },
}

impl Event {
    /// The job this event belongs to.
    pub fn job_id(&self) -> Uuid {
        match self {
            Event::JobSubmitted { job_id, .. }
            | Event::JobStatusChanged { job_id, .. }
            | Event::InstructionStatusChanged { job_id, .. }
            | Event::VariableUpdated { job_id, .. }
            | Event::ActiveInstructionsChanged { job_id, .. }
            | Event::BreakpointHit { job_id, .. }
            | Event::LogAppended { job_id, .. }
            | Event::LogCleared { job_id }
            | Event::UserChoiceRequested { job_id, .. }
            | Event::UserInputRequested { job_id, .. }
            | Event::JobRemoved { job_id } => *job_id,
        }
    }
}
