//! Execution status of a job.
//!
//! This module defines the canonical job state machine values shared by the
//! core and any GUI front-end.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Represents the current execution status of a job.
///
/// Normal progression: Initial -> Running -> Succeeded | Failed.
///
/// Control states:
/// - Paused: the worker is held at the next wait point
/// - Stepping: a single step was released from Paused
/// - Canceling: a stop was requested and the worker has not finished yet
///
/// GUI-only states:
/// - Undefined: a job that was never set up
/// - SubmitFailure: the procedure was rejected before any worker was spawned
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerStatus {
    #[default]
    Undefined,
    Initial,
    Running,
    Paused,
    Stepping,
    Canceling,
    Succeeded,
    Failed,
    Halted,
    SubmitFailure,
}

impl RunnerStatus {
    /// All values, in declaration order.
    pub const ALL: [RunnerStatus; 10] = [
        RunnerStatus::Undefined,
        RunnerStatus::Initial,
        RunnerStatus::Running,
        RunnerStatus::Paused,
        RunnerStatus::Stepping,
        RunnerStatus::Canceling,
        RunnerStatus::Succeeded,
        RunnerStatus::Failed,
        RunnerStatus::Halted,
        RunnerStatus::SubmitFailure,
    ];

    /// Human readable name, as displayed in job lists.
    pub fn as_str(self) -> &'static str {
        match self {
            RunnerStatus::Undefined => "Undefined",
            RunnerStatus::Initial => "Initial",
            RunnerStatus::Running => "Running",
            RunnerStatus::Paused => "Paused",
            RunnerStatus::Stepping => "Stepping",
            RunnerStatus::Canceling => "Canceling",
            RunnerStatus::Succeeded => "Succeeded",
            RunnerStatus::Failed => "Failed",
            RunnerStatus::Halted => "Halted",
            RunnerStatus::SubmitFailure => "Submit failure",
        }
    }

    /// True for states a run settles in once its worker has terminated.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            RunnerStatus::Succeeded | RunnerStatus::Failed | RunnerStatus::Halted
        )
    }

    /// True while a worker thread exists for the job.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            RunnerStatus::Running
                | RunnerStatus::Paused
                | RunnerStatus::Stepping
                | RunnerStatus::Canceling
        )
    }

    /// Finished jobs have to be reset before they can run again.
    pub fn is_reset_required(self) -> bool {
        self.is_finished()
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known [`RunnerStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown runner status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for RunnerStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunnerStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}
