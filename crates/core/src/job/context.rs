//! Job context and its execution state machine.
//!
//! ```text
//! Initial -> Running <-> Paused -> Stepping -> Paused | Running
//!               \__________\__________\-> Canceling -> Halted
//! Running -> Succeeded | Failed
//! ```
//!
//! Every mutation happens on the thread owning the job manager, either from
//! a control command or from a drained [`DomainEvent`]. Rejected commands
//! are no-ops that leave a Warning entry in the job log.

use crate::domain::DomainRuntime;
use crate::error::{JobError, JobResult};
use crate::flow::{FlowController, WaitingMode};
use crate::job::worker::spawn_worker;
use crate::job::JobEnv;
use crate::log::JobLog;
use crate::observer::{Breakpoints, DomainEvent, JobObserver, RunOutcome};
use crate::request::{Delivery, PendingRequests};
use ot_protocol::ipc::Event;
use ot_protocol::log_models::{LogEvent, Severity};
use ot_protocol::procedure_models::{InstructionStatus, ProcedureDefinition};
use ot_protocol::request_models::{UserChoiceResult, UserInputResult};
use ot_protocol::runner_status::RunnerStatus;
use std::sync::{Arc, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Display state of one instruction, by pre-order index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionState {
    pub type_name: String,
    pub name: String,
    pub status: InstructionStatus,
}

/// Last known value of a workspace variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableState {
    pub name: String,
    pub type_name: String,
    /// Value as JSON.
    pub value: String,
    pub connected: bool,
}

/// Resources of a live run.
///
/// Dropping a session stops the run and joins its worker.
struct RunSession {
    runtime: Arc<dyn DomainRuntime>,
    flow: Arc<FlowController>,
    requests: Arc<PendingRequests>,
    worker: Option<JoinHandle<()>>,
}

impl RunSession {
    fn halt(&self) {
        // Halt first: a runtime seeing a cancelled request checks for it.
        self.runtime.halt();
        self.flow.interrupt();
        self.requests.cancel_all();
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
    }
}

impl Drop for RunSession {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.halt();
            self.join();
        }
    }
}

pub struct JobContext {
    id: Uuid,
    procedure: ProcedureDefinition,
    /// Why the procedure was refused at submission.
    rejection: Option<String>,
    status: RunnerStatus,
    instructions: Vec<InstructionState>,
    variables: Vec<VariableState>,
    active_instructions: Vec<u32>,
    breakpoints: Breakpoints,
    log: JobLog,
    run: u64,
    delay_msec: u64,
    parked: bool,
    steps_finished: u64,
    outcome: Option<RunOutcome>,
    session: Option<RunSession>,
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("id", &self.id)
            .field("procedure", &self.procedure.name)
            .field("status", &self.status)
            .field("run", &self.run)
            .field("log", &self.log)
            .finish_non_exhaustive()
    }
}

fn initial_instructions(procedure: &ProcedureDefinition) -> Vec<InstructionState> {
    procedure
        .instructions_preorder()
        .into_iter()
        .map(|instruction| InstructionState {
            type_name: instruction.type_name.clone(),
            name: instruction.name.clone(),
            status: InstructionStatus::NotStarted,
        })
        .collect()
}

fn initial_variables(procedure: &ProcedureDefinition) -> Vec<VariableState> {
    procedure
        .variables
        .iter()
        .map(|variable| VariableState {
            name: variable.name.clone(),
            type_name: variable.type_name.clone(),
            value: variable.value.clone().unwrap_or_default(),
            connected: false,
        })
        .collect()
}

impl JobContext {
    pub(crate) fn new(id: Uuid, procedure: ProcedureDefinition, delay_msec: u64) -> Self {
        Self {
            id,
            instructions: initial_instructions(&procedure),
            variables: initial_variables(&procedure),
            procedure,
            rejection: None,
            status: RunnerStatus::Initial,
            active_instructions: Vec::new(),
            breakpoints: Breakpoints::default(),
            log: JobLog::new(),
            run: 0,
            delay_msec,
            parked: false,
            steps_finished: 0,
            outcome: None,
            session: None,
        }
    }

    /// A job whose procedure was refused; it can never run.
    pub(crate) fn rejected(
        id: Uuid,
        procedure: ProcedureDefinition,
        reason: String,
        env: &JobEnv,
    ) -> Self {
        let mut job = Self::new(id, procedure, env.config.tick_timeout_msec);
        job.status = RunnerStatus::SubmitFailure;
        job.log_event(Severity::Error, format!("Submit failure: {reason}"), env);
        job.rejection = Some(reason);
        job
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn procedure(&self) -> &ProcedureDefinition {
        &self.procedure
    }

    pub fn status(&self) -> RunnerStatus {
        self.status
    }

    pub fn log(&self) -> &JobLog {
        &self.log
    }

    /// Mutable access to attach a message sink or listeners.
    pub fn log_mut(&mut self) -> &mut JobLog {
        &mut self.log
    }

    pub fn instructions(&self) -> &[InstructionState] {
        &self.instructions
    }

    pub fn instruction_status(&self, index: u32) -> Option<InstructionStatus> {
        self.instructions.get(index as usize).map(|i| i.status)
    }

    pub fn variables(&self) -> &[VariableState] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&VariableState> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Instructions about to execute, by pre-order index.
    pub fn active_instructions(&self) -> &[u32] {
        &self.active_instructions
    }

    pub fn breakpoints(&self) -> Vec<u32> {
        self.breakpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Runs started so far.
    pub fn run_count(&self) -> u64 {
        self.run
    }

    pub fn delay_msec(&self) -> u64 {
        self.delay_msec
    }

    /// True once the worker is blocked waiting for a release and has used
    /// every released step.
    pub fn is_parked(&self) -> bool {
        self.parked
    }

    /// Steps the runtime completed in the current run.
    pub fn steps_finished(&self) -> u64 {
        self.steps_finished
    }

    pub fn last_outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    /// User requests waiting for an answer.
    pub fn pending_request_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.requests.len())
    }

    pub fn has_worker(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.worker.is_some())
    }

    fn run_mode(&self) -> WaitingMode {
        if self.delay_msec == 0 {
            WaitingMode::Proceed
        } else {
            WaitingMode::SleepFor
        }
    }

    fn apply_delay(&self, flow: &FlowController) -> JobResult<()> {
        if self.delay_msec > 0 {
            flow.set_sleep_time(self.delay_msec)?;
        }
        Ok(())
    }

    fn set_status(&mut self, status: RunnerStatus, env: &JobEnv) {
        if self.status == status {
            return;
        }
        debug!(job_id = %self.id, run = self.run, from = %self.status, to = %status, "status changed");
        self.status = status;
        env.notify(Event::JobStatusChanged {
            job_id: self.id,
            status,
        });
    }

    fn append_log(&mut self, event: LogEvent, env: &JobEnv) {
        self.log.append(event.clone());
        env.notify(Event::LogAppended {
            job_id: self.id,
            event,
        });
    }

    fn log_event(&mut self, severity: Severity, message: impl Into<String>, env: &JobEnv) {
        let event = LogEvent::now(severity, env.config.log_source.as_str(), message);
        self.append_log(event, env);
    }

    fn clear_log(&mut self, env: &JobEnv) {
        self.log.clear_log();
        env.notify(Event::LogCleared { job_id: self.id });
    }

    fn reject(&mut self, command: &str, env: &JobEnv) {
        warn!(job_id = %self.id, status = %self.status, "{command} request ignored");
        let message = format!("{command} request ignored: job is {}", self.status);
        self.log_event(Severity::Warning, message, env);
    }

    fn ensure_accepted(&self) -> JobResult<()> {
        match &self.rejection {
            Some(reason) => Err(JobError::SubmitFailure(reason.clone())),
            None => Ok(()),
        }
    }

    /// Restores instruction and variable state to the definitions.
    fn reset_model(&mut self, env: &JobEnv) {
        for (index, instruction) in self.instructions.iter_mut().enumerate() {
            if instruction.status != InstructionStatus::NotStarted {
                instruction.status = InstructionStatus::NotStarted;
                env.notify(Event::InstructionStatusChanged {
                    job_id: self.id,
                    index: index as u32,
                    name: instruction.name.clone(),
                    status: InstructionStatus::NotStarted,
                });
            }
        }
        self.variables = initial_variables(&self.procedure);
        self.active_instructions.clear();
        self.steps_finished = 0;
        self.parked = false;
        self.outcome = None;
    }

    fn begin_run(&mut self, stepping: bool, env: &JobEnv) -> JobResult<()> {
        self.ensure_accepted()?;
        self.session = None;
        if self.run > 0 {
            self.reset_model(env);
        }
        if env.config.clear_log_on_start {
            self.clear_log(env);
        }

        let runtime = match env.factory.create(&self.procedure) {
            Ok(runtime) => runtime,
            Err(e) => {
                let reason = format!("{e:#}");
                warn!(job_id = %self.id, "runtime creation failed: {reason}");
                self.log_event(Severity::Error, format!("Submit failure: {reason}"), env);
                self.set_status(RunnerStatus::SubmitFailure, env);
                return Err(JobError::SubmitFailure(reason));
            }
        };

        self.run += 1;
        let flow = Arc::new(FlowController::new());
        self.apply_delay(&flow)?;
        flow.set_waiting_mode(if stepping {
            WaitingMode::WaitForRelease
        } else {
            self.run_mode()
        });
        let requests = Arc::new(PendingRequests::new());

        let observer = JobObserver::new(
            self.id,
            self.run,
            env.config.log_source.as_str(),
            env.messages_tx.clone(),
            Arc::clone(&flow),
            Arc::clone(&requests),
            Arc::clone(&self.breakpoints),
        );
        let worker = match spawn_worker(self.id, self.run, Arc::clone(&runtime), observer) {
            Ok(worker) => worker,
            Err(e) => {
                self.log_event(Severity::Error, e.to_string(), env);
                self.set_status(RunnerStatus::Failed, env);
                return Err(e);
            }
        };

        self.session = Some(RunSession {
            runtime,
            flow,
            requests,
            worker: Some(worker),
        });
        self.parked = false;
        self.steps_finished = 0;
        self.outcome = None;

        let message = format!("Starting procedure '{}'", self.procedure.name);
        self.log_event(Severity::Info, message, env);
        self.set_status(
            if stepping {
                RunnerStatus::Stepping
            } else {
                RunnerStatus::Running
            },
            env,
        );
        Ok(())
    }

    /// Starts a new run, or resumes a paused one.
    pub(crate) fn start(&mut self, env: &JobEnv) -> JobResult<()> {
        match self.status {
            RunnerStatus::Paused | RunnerStatus::Stepping => {
                if let Some(session) = &self.session {
                    self.apply_delay(&session.flow)?;
                    session.flow.release(self.run_mode());
                }
                self.parked = false;
                self.log_event(Severity::Info, "Resume request", env);
                self.set_status(RunnerStatus::Running, env);
                Ok(())
            }
            RunnerStatus::Running | RunnerStatus::Canceling => {
                self.reject("Start", env);
                Ok(())
            }
            _ => self.begin_run(false, env),
        }
    }

    pub(crate) fn pause(&mut self, env: &JobEnv) {
        if self.status != RunnerStatus::Running {
            self.reject("Pause", env);
            return;
        }
        if let Some(session) = &self.session {
            session.flow.set_waiting_mode(WaitingMode::WaitForRelease);
        }
        self.parked = false;
        self.log_event(Severity::Info, "Pause request", env);
        self.set_status(RunnerStatus::Paused, env);
    }

    /// Releases one step while paused; starts a paused run from idle.
    pub(crate) fn step(&mut self, env: &JobEnv) -> JobResult<()> {
        match self.status {
            RunnerStatus::Paused | RunnerStatus::Stepping => {
                if let Some(session) = &self.session {
                    session.flow.hold();
                    session.flow.step_request();
                }
                self.parked = false;
                self.set_status(RunnerStatus::Stepping, env);
                Ok(())
            }
            RunnerStatus::Running | RunnerStatus::Canceling => {
                self.reject("Step", env);
                Ok(())
            }
            _ => self.begin_run(true, env),
        }
    }

    pub(crate) fn stop(&mut self, env: &JobEnv) {
        match self.status {
            RunnerStatus::Initial => {
                self.log_event(Severity::Warning, "Stop request", env);
                self.set_status(RunnerStatus::Halted, env);
            }
            RunnerStatus::Running | RunnerStatus::Paused | RunnerStatus::Stepping => {
                self.log_event(Severity::Warning, "Stop request", env);
                if let Some(session) = &self.session {
                    session.halt();
                }
                self.set_status(RunnerStatus::Canceling, env);
            }
            RunnerStatus::Canceling => {}
            _ => self.reject("Stop", env),
        }
    }

    /// Zero runs without delay. Applies at the next wait point while
    /// running; otherwise it is the pace a resumed run picks up.
    pub(crate) fn change_delay(&mut self, msec: u64) -> JobResult<()> {
        self.delay_msec = msec;
        debug!(job_id = %self.id, msec, "delay changed");
        if self.status != RunnerStatus::Running {
            return Ok(());
        }
        if let Some(session) = &self.session {
            self.apply_delay(&session.flow)?;
            // A breakpoint hold not drained yet keeps the worker parked.
            if session.flow.waiting_mode() != WaitingMode::WaitForRelease {
                session.flow.set_waiting_mode(self.run_mode());
            }
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self, env: &JobEnv) -> JobResult<()> {
        if self.status.is_busy() {
            return Err(JobError::JobIsRunning(self.id));
        }
        self.ensure_accepted()?;
        self.session = None;
        self.reset_model(env);
        self.clear_log(env);
        self.set_status(RunnerStatus::Initial, env);
        Ok(())
    }

    pub(crate) fn set_breakpoint(&mut self, index: u32, enabled: bool) -> JobResult<()> {
        if index as usize >= self.instructions.len() {
            return Err(JobError::InstructionOutOfRange {
                job_id: self.id,
                index,
            });
        }
        let mut breakpoints = self.breakpoints.lock().unwrap_or_else(PoisonError::into_inner);
        if enabled {
            breakpoints.insert(index);
        } else {
            breakpoints.remove(&index);
        }
        Ok(())
    }

    fn requests(&self, request_id: u64) -> JobResult<&PendingRequests> {
        self.session
            .as_ref()
            .map(|s| s.requests.as_ref())
            .ok_or(JobError::RequestNotFound {
                job_id: self.id,
                request_id,
            })
    }

    pub(crate) fn answer_user_choice(
        &self,
        request_id: u64,
        result: UserChoiceResult,
    ) -> JobResult<()> {
        let requests = self.requests(request_id)?;
        let delivery = if result.processed {
            requests.answer_choice(request_id, result.index)
        } else if requests.cancel(request_id) {
            Delivery::Delivered
        } else {
            Delivery::NotPending
        };
        match delivery {
            Delivery::Delivered => Ok(()),
            Delivery::OutOfRange { options } => Err(JobError::InvalidInput(format!(
                "choice {} is out of range for {options} options",
                result.index
            ))),
            Delivery::NotPending => Err(JobError::RequestNotFound {
                job_id: self.id,
                request_id,
            }),
        }
    }

    pub(crate) fn answer_user_input(
        &self,
        request_id: u64,
        result: UserInputResult,
    ) -> JobResult<()> {
        let requests = self.requests(request_id)?;
        let resolved = if result.processed {
            let value = serde_json::from_str(&result.value)
                .map_err(|e| JobError::InvalidInput(e.to_string()))?;
            requests.answer_input(request_id, value)
        } else {
            requests.cancel(request_id)
        };
        if resolved {
            Ok(())
        } else {
            Err(JobError::RequestNotFound {
                job_id: self.id,
                request_id,
            })
        }
    }

    /// Stops a live run and joins its worker; used on teardown.
    pub(crate) fn join_worker(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.halt();
            session.join();
        }
    }

    /// Applies one event of the current run.
    ///
    /// `is_active` tells whether this job is the one whose active
    /// instructions the GUI displays.
    pub(crate) fn handle(&mut self, event: DomainEvent, is_active: bool, env: &JobEnv) {
        match event {
            DomainEvent::InstructionStatusChanged { index, status } => {
                let Some(instruction) = self.instructions.get_mut(index as usize) else {
                    warn!(job_id = %self.id, index, "status for unknown instruction");
                    return;
                };
                instruction.status = status;
                env.notify(Event::InstructionStatusChanged {
                    job_id: self.id,
                    index,
                    name: instruction.name.clone(),
                    status,
                });
            }
            DomainEvent::VariableUpdated {
                name,
                value,
                connected,
            } => {
                match self.variables.iter_mut().find(|v| v.name == name) {
                    Some(variable) => {
                        variable.value = value.clone();
                        variable.connected = connected;
                    }
                    None => self.variables.push(VariableState {
                        name: name.clone(),
                        type_name: String::new(),
                        value: value.clone(),
                        connected,
                    }),
                }
                env.notify(Event::VariableUpdated {
                    job_id: self.id,
                    name,
                    value,
                    connected,
                });
            }
            DomainEvent::NextInstructions(indices) => {
                self.active_instructions = indices;
                if is_active {
                    self.notify_active_instructions(env);
                }
            }
            DomainEvent::UserChoiceRequested { request_id, args } => {
                env.notify(Event::UserChoiceRequested {
                    job_id: self.id,
                    request_id,
                    args,
                });
            }
            DomainEvent::UserInputRequested { request_id, args } => {
                env.notify(Event::UserInputRequested {
                    job_id: self.id,
                    request_id,
                    args,
                });
            }
            DomainEvent::BreakpointHit { index } => {
                let name = self
                    .instructions
                    .get(index as usize)
                    .map(|i| i.name.clone())
                    .unwrap_or_default();
                self.log_event(
                    Severity::Info,
                    format!("Breakpoint hit at instruction {index} '{name}'"),
                    env,
                );
                if matches!(self.status, RunnerStatus::Running | RunnerStatus::Stepping) {
                    self.set_status(RunnerStatus::Paused, env);
                }
                env.notify(Event::BreakpointHit {
                    job_id: self.id,
                    index,
                });
            }
            DomainEvent::StepStarted => {
                self.log_event(Severity::Debug, "Step started", env);
            }
            DomainEvent::StepFinished => {
                self.steps_finished += 1;
                self.log_event(Severity::Debug, "Step finished", env);
            }
            DomainEvent::Parked { retired } => {
                let all_used = self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.flow.granted() == retired);
                if all_used {
                    self.parked = true;
                    if self.status == RunnerStatus::Stepping {
                        self.set_status(RunnerStatus::Paused, env);
                    }
                }
            }
            DomainEvent::Log(event) => self.append_log(event, env),
            DomainEvent::Finished(outcome) => self.finish(outcome, is_active, env),
        }
    }

    fn finish(&mut self, outcome: RunOutcome, is_active: bool, env: &JobEnv) {
        if let Some(mut session) = self.session.take() {
            session.join();
        }

        let status = match (&outcome, self.status) {
            (RunOutcome::Failed(_), _) => RunnerStatus::Failed,
            (_, RunnerStatus::Canceling) | (RunOutcome::Halted, _) => RunnerStatus::Halted,
            (RunOutcome::Succeeded, _) => RunnerStatus::Succeeded,
        };
        match &outcome {
            RunOutcome::Failed(reason) => {
                self.log_event(Severity::Error, format!("Procedure failed: {reason}"), env);
            }
            _ => {
                let message = format!("Procedure finished: {status}");
                self.log_event(Severity::Info, message, env);
            }
        }

        self.active_instructions.clear();
        if is_active {
            self.notify_active_instructions(env);
        }
        self.parked = false;
        self.outcome = Some(outcome);
        self.set_status(status, env);
    }

    pub(crate) fn notify_active_instructions(&self, env: &JobEnv) {
        env.notify(Event::ActiveInstructionsChanged {
            job_id: self.id,
            indices: self.active_instructions.clone(),
        });
    }
}
