//! Per-job state and the worker thread of a run.
//!
//! A [`JobContext`] binds a procedure to its status, log, breakpoints and,
//! while a run is live, the runtime, flow controller, pending requests and
//! worker thread of that run.

pub mod context;
pub(crate) mod worker;

pub use context::{InstructionState, JobContext, VariableState};

use crate::domain::RuntimeFactory;
use crate::observer::JobMessage;
use ot_protocol::config_models::GlobalConfig;
use ot_protocol::ipc::Event;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Everything a job needs from its manager to start runs and report.
pub(crate) struct JobEnv {
    pub factory: Arc<dyn RuntimeFactory>,
    pub messages_tx: UnboundedSender<JobMessage>,
    pub events_tx: UnboundedSender<Event>,
    pub config: GlobalConfig,
}

impl JobEnv {
    pub fn notify(&self, event: Event) {
        // A closed GUI side is not an error for the job.
        let _ = self.events_tx.send(event);
    }
}
