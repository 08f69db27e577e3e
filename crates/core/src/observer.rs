//! Translation of domain callbacks into job messages.
//!
//! [`JobObserver`] is handed to the domain runtime of one run. It never
//! touches job state: every callback becomes a [`DomainEvent`] posted to the
//! job manager's queue. Posting never blocks; the observer only blocks at
//! wait points and while a user request is outstanding.

use crate::domain::DomainObserver;
use crate::flow::FlowController;
use crate::request::{PendingRequests, RequestOutcome};
use ot_protocol::log_models::{LogEvent, Severity};
use ot_protocol::procedure_models::InstructionStatus;
use ot_protocol::request_models::{UserChoiceArgs, UserInputArgs};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;
use uuid::Uuid;

/// How a run ended, as seen from the worker boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    /// Failure reported by the runtime, or a panic.
    Failed(String),
    Halted,
}

/// Events produced on the worker thread of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    InstructionStatusChanged { index: u32, status: InstructionStatus },
    /// `value` is a JSON snapshot taken during the callback.
    VariableUpdated { name: String, value: String, connected: bool },
    NextInstructions(Vec<u32>),
    UserChoiceRequested { request_id: u64, args: UserChoiceArgs },
    UserInputRequested { request_id: u64, args: UserInputArgs },
    BreakpointHit { index: u32 },
    StepStarted,
    StepFinished,
    /// The worker blocked waiting for a release, having retired
    /// `retired` release tokens.
    Parked { retired: u64 },
    Log(LogEvent),
    /// Last event of every run.
    Finished(RunOutcome),
}

/// A [`DomainEvent`] tagged with the job and run that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobMessage {
    pub job_id: Uuid,
    pub run: u64,
    pub event: DomainEvent,
}

/// Breakpoints of a job, shared with the observers of its runs.
pub type Breakpoints = Arc<Mutex<BTreeSet<u32>>>;

pub struct JobObserver {
    job_id: Uuid,
    run: u64,
    source: String,
    tx: UnboundedSender<JobMessage>,
    flow: Arc<FlowController>,
    requests: Arc<PendingRequests>,
    breakpoints: Breakpoints,
    active: Mutex<HashSet<u32>>,
}

impl JobObserver {
    pub fn new(
        job_id: Uuid,
        run: u64,
        source: impl Into<String>,
        tx: UnboundedSender<JobMessage>,
        flow: Arc<FlowController>,
        requests: Arc<PendingRequests>,
        breakpoints: Breakpoints,
    ) -> Self {
        Self {
            job_id,
            run,
            source: source.into(),
            tx,
            flow,
            requests,
            breakpoints,
            active: Mutex::new(HashSet::new()),
        }
    }

    fn post(&self, event: DomainEvent) {
        // The manager may already be gone during teardown.
        let _ = self.tx.send(JobMessage {
            job_id: self.job_id,
            run: self.run,
            event,
        });
    }

    fn log(&self, severity: Severity, message: impl Into<String>) {
        self.post(DomainEvent::Log(LogEvent::now(
            severity,
            self.source.as_str(),
            message,
        )));
    }

    fn wait(&self) {
        self.flow
            .wait_if_necessary_with(|retired| self.post(DomainEvent::Parked { retired }));
    }

    /// Posts the final event of the run.
    pub fn finish(&self, outcome: RunOutcome) {
        self.post(DomainEvent::Finished(outcome));
    }

    /// True when `index` just became active and carries a breakpoint.
    fn breakpoint_reached(&self, index: u32, status: InstructionStatus) -> bool {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !status.is_active() {
            active.remove(&index);
            return false;
        }
        active.insert(index)
            && self
                .breakpoints
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&index)
    }
}

impl DomainObserver for JobObserver {
    fn on_instruction_status_changed(&self, index: u32, status: InstructionStatus) {
        self.post(DomainEvent::InstructionStatusChanged { index, status });

        if self.breakpoint_reached(index, status) {
            // Hold before posting: a resume reacting to the hit must win.
            self.flow.hold();
            self.post(DomainEvent::BreakpointHit { index });
            self.wait();
        }
    }

    fn on_variable_updated(&self, name: &str, value: &Value, connected: bool) {
        self.post(DomainEvent::VariableUpdated {
            name: name.to_string(),
            value: value.to_string(),
            connected,
        });
    }

    fn on_user_input_request(&self, args: UserInputArgs) -> Option<Value> {
        let (request_id, handler) = self.requests.open_input()?;
        self.post(DomainEvent::UserInputRequested { request_id, args });

        let outcome = handler.get_data();
        self.requests.finish(request_id);
        match outcome {
            Ok(RequestOutcome::Answered(value)) => Some(value),
            Ok(RequestOutcome::Cancelled) => None,
            Err(e) => {
                warn!(job_id = %self.job_id, request_id, "user input request misused: {e}");
                None
            }
        }
    }

    fn on_user_choice_request(&self, args: UserChoiceArgs) -> Option<usize> {
        let (request_id, handler) = self.requests.open_choice(args.options.len())?;
        self.post(DomainEvent::UserChoiceRequested { request_id, args });

        let outcome = handler.get_data();
        self.requests.finish(request_id);
        match outcome {
            Ok(RequestOutcome::Answered(index)) => Some(index),
            Ok(RequestOutcome::Cancelled) => None,
            Err(e) => {
                warn!(job_id = %self.job_id, request_id, "user choice request misused: {e}");
                None
            }
        }
    }

    fn on_single_step_start(&self) {
        self.post(DomainEvent::StepStarted);
    }

    fn on_single_step_end(&self) {
        self.post(DomainEvent::StepFinished);
        self.wait();
    }

    fn on_next_instructions(&self, indices: &[u32]) {
        self.post(DomainEvent::NextInstructions(indices.to_vec()));
    }

    fn on_message(&self, text: &str) {
        self.log(Severity::Info, text);
    }

    fn on_log(&self, severity: Severity, text: &str) {
        self.log(severity, text);
    }

    fn on_put_value(&self, value: &Value, description: &str) {
        self.log(
            Severity::Info,
            format!("Put value request > {description} {value}"),
        );
    }
}
