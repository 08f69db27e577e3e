//! Job manager coordinating every job of the GUI.
//!
//! The JobManager is the single owner of all [`JobContext`]s. It routes
//! control commands to the right job and drains the queue the worker threads
//! post their [`JobMessage`]s to, applying each message on the thread that
//! owns the manager and republishing it as a protocol [`Event`].

use crate::domain::registry::DomainRegistry;
use crate::domain::RuntimeFactory;
use crate::error::{JobError, JobResult};
use crate::job::{JobContext, JobEnv};
use crate::observer::JobMessage;
use ot_protocol::config_models::GlobalConfig;
use ot_protocol::ipc::{Event, Op};
use ot_protocol::procedure_models::ProcedureDefinition;
use ot_protocol::request_models::{UserChoiceResult, UserInputResult};
use ot_protocol::runner_status::RunnerStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Manages all jobs and their worker threads.
///
/// The JobManager provides a centralized interface for:
/// - Submitting procedures as jobs
/// - Starting, pausing, stepping and stopping jobs
/// - Answering user requests of running jobs
/// - Applying worker events and notifying the GUI
///
/// Dropping the manager stops every job and joins every worker thread.
pub struct JobManager {
    registry: Arc<DomainRegistry>,
    env: JobEnv,
    /// Jobs in submission order.
    jobs: Vec<JobContext>,
    active_job: Option<Uuid>,
    messages_rx: UnboundedReceiver<JobMessage>,
}

fn find_job(jobs: &mut [JobContext], id: Uuid) -> JobResult<&mut JobContext> {
    jobs.iter_mut()
        .find(|job| job.id() == id)
        .ok_or(JobError::JobNotFound(id))
}

impl JobManager {
    /// Create a new JobManager.
    ///
    /// # Arguments
    ///
    /// * `registry` - Types procedures are validated against
    /// * `factory` - Creates the domain runtime of every run
    /// * `config` - Global settings
    /// * `events_tx` - Channel for sending events to the GUI
    pub fn new(
        registry: Arc<DomainRegistry>,
        factory: Arc<dyn RuntimeFactory>,
        config: GlobalConfig,
        events_tx: UnboundedSender<Event>,
    ) -> Self {
        let (messages_tx, messages_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            env: JobEnv {
                factory,
                messages_tx,
                events_tx,
                config,
            },
            jobs: Vec::new(),
            active_job: None,
            messages_rx,
        }
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.env.config
    }

    pub fn registry(&self) -> &DomainRegistry {
        &self.registry
    }

    /// Register a procedure as a new job in `Initial` state.
    ///
    /// # Errors
    ///
    /// Returns `JobError::SubmitFailure` if the procedure does not validate.
    /// The job is still registered, with status `SubmitFailure` and an error
    /// in its log.
    pub fn submit_job(&mut self, procedure: ProcedureDefinition) -> JobResult<Uuid> {
        let id = Uuid::new_v4();
        let procedure_name = procedure.name.clone();
        let validation = self.registry.validate(&procedure);
        self.env.notify(Event::JobSubmitted {
            job_id: id,
            procedure_name: procedure_name.clone(),
        });

        let job = match &validation {
            Ok(()) => JobContext::new(id, procedure, self.env.config.tick_timeout_msec),
            Err(e) => {
                let reason = match e {
                    JobError::SubmitFailure(reason) => reason.clone(),
                    other => other.to_string(),
                };
                warn!(job_id = %id, "procedure '{procedure_name}' rejected: {reason}");
                JobContext::rejected(id, procedure, reason, &self.env)
            }
        };
        let status = job.status();
        self.jobs.push(job);

        info!(job_id = %id, %status, "job '{procedure_name}' submitted");
        self.env.notify(Event::JobStatusChanged { job_id: id, status });

        validation.map(|()| id)
    }

    /// Submit a procedure and start it right away.
    pub fn start_procedure_request(&mut self, procedure: ProcedureDefinition) -> JobResult<Uuid> {
        let id = self.submit_job(procedure)?;
        self.start(id)?;
        Ok(id)
    }

    /// Start a job, or resume it when paused.
    ///
    /// Starting a running job is a no-op leaving a warning in its log.
    ///
    /// # Errors
    ///
    /// Returns `JobError::SubmitFailure` if the runtime could not be created.
    pub fn start(&mut self, id: Uuid) -> JobResult<()> {
        let job = find_job(&mut self.jobs, id)?;
        job.start(&self.env)
    }

    pub fn pause(&mut self, id: Uuid) -> JobResult<()> {
        let job = find_job(&mut self.jobs, id)?;
        job.pause(&self.env);
        Ok(())
    }

    /// Release one step of a paused job, or start a job paused after its
    /// first step.
    pub fn step(&mut self, id: Uuid) -> JobResult<()> {
        let job = find_job(&mut self.jobs, id)?;
        job.step(&self.env)
    }

    /// Request a cooperative halt.
    ///
    /// Safe in any state, including while the worker waits for user input.
    /// The job settles in `Halted` once its worker has finished.
    pub fn stop(&mut self, id: Uuid) -> JobResult<()> {
        let job = find_job(&mut self.jobs, id)?;
        job.stop(&self.env);
        Ok(())
    }

    /// Bring a job that is not running back to `Initial`.
    pub fn reset(&mut self, id: Uuid) -> JobResult<()> {
        let job = find_job(&mut self.jobs, id)?;
        job.reset(&self.env)
    }

    /// Set the delay between steps in milliseconds; zero means no delay.
    pub fn change_delay(&mut self, id: Uuid, msec: u64) -> JobResult<()> {
        let job = find_job(&mut self.jobs, id)?;
        job.change_delay(msec)
    }

    pub fn set_breakpoint(&mut self, id: Uuid, index: u32) -> JobResult<()> {
        find_job(&mut self.jobs, id)?.set_breakpoint(index, true)
    }

    pub fn remove_breakpoint(&mut self, id: Uuid, index: u32) -> JobResult<()> {
        find_job(&mut self.jobs, id)?.set_breakpoint(index, false)
    }

    /// Resolve a pending user-choice request; `processed == false` cancels it.
    pub fn answer_user_choice(
        &mut self,
        id: Uuid,
        request_id: u64,
        result: UserChoiceResult,
    ) -> JobResult<()> {
        find_job(&mut self.jobs, id)?.answer_user_choice(request_id, result)
    }

    /// Resolve a pending user-input request; the value must be JSON.
    pub fn answer_user_input(
        &mut self,
        id: Uuid,
        request_id: u64,
        result: UserInputResult,
    ) -> JobResult<()> {
        find_job(&mut self.jobs, id)?.answer_user_input(request_id, result)
    }

    /// Remove a job.
    ///
    /// # Errors
    ///
    /// Returns `JobError::JobIsRunning` while the job has a live worker.
    pub fn remove_job(&mut self, id: Uuid) -> JobResult<()> {
        let position = self
            .jobs
            .iter()
            .position(|job| job.id() == id)
            .ok_or(JobError::JobNotFound(id))?;
        if self.jobs[position].status().is_busy() {
            return Err(JobError::JobIsRunning(id));
        }

        self.jobs.remove(position);
        if self.active_job == Some(id) {
            self.active_job = None;
        }
        debug!(job_id = %id, "job removed");
        self.env.notify(Event::JobRemoved { job_id: id });
        Ok(())
    }

    /// Stop every job with a live worker.
    pub fn stop_all_jobs(&mut self) {
        for job in &mut self.jobs {
            if job.status().is_busy() {
                job.stop(&self.env);
            }
        }
    }

    pub fn has_running_jobs(&self) -> bool {
        self.jobs.iter().any(|job| job.status().is_busy())
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn job(&self, id: Uuid) -> Option<&JobContext> {
        self.jobs.iter().find(|job| job.id() == id)
    }

    /// Mutable access, e.g. to attach a message sink to the job log.
    pub fn job_mut(&mut self, id: Uuid) -> Option<&mut JobContext> {
        self.jobs.iter_mut().find(|job| job.id() == id)
    }

    /// Ids of all jobs in submission order.
    pub fn job_ids(&self) -> Vec<Uuid> {
        self.jobs.iter().map(JobContext::id).collect()
    }

    pub fn active_job(&self) -> Option<Uuid> {
        self.active_job
    }

    /// Select the job whose active instructions are forwarded to the GUI.
    ///
    /// The job's current active instructions are sent right away.
    pub fn set_active_job(&mut self, id: Option<Uuid>) -> JobResult<()> {
        if let Some(id) = id {
            let job = self.job(id).ok_or(JobError::JobNotFound(id))?;
            job.notify_active_instructions(&self.env);
        }
        self.active_job = id;
        Ok(())
    }

    /// Dispatch a protocol operation.
    ///
    /// # Returns
    ///
    /// The id of the new job for `Op::SubmitJob`, `None` otherwise.
    pub fn handle_op(&mut self, op: Op) -> JobResult<Option<Uuid>> {
        match op {
            Op::SubmitJob { procedure } => return self.submit_job(procedure).map(Some),
            Op::StartJob { job_id } => self.start(job_id)?,
            Op::PauseJob { job_id } => self.pause(job_id)?,
            Op::StepJob { job_id } => self.step(job_id)?,
            Op::StopJob { job_id } => self.stop(job_id)?,
            Op::ResetJob { job_id } => self.reset(job_id)?,
            Op::RemoveJob { job_id } => self.remove_job(job_id)?,
            Op::ChangeDelay { job_id, msec } => self.change_delay(job_id, msec)?,
            Op::ToggleBreakpoint {
                job_id,
                instruction_index,
                enabled,
            } => find_job(&mut self.jobs, job_id)?.set_breakpoint(instruction_index, enabled)?,
            Op::SetActiveJob { job_id } => self.set_active_job(job_id)?,
            Op::AnswerUserChoice {
                job_id,
                request_id,
                result,
            } => self.answer_user_choice(job_id, request_id, result)?,
            Op::AnswerUserInput {
                job_id,
                request_id,
                result,
            } => self.answer_user_input(job_id, request_id, result)?,
            Op::Shutdown => {
                self.stop_all_jobs();
                self.join_all();
                self.process_pending();
            }
        }
        Ok(None)
    }

    fn dispatch(&mut self, message: JobMessage) {
        let is_active = self.active_job == Some(message.job_id);
        let Some(job) = self.jobs.iter_mut().find(|job| job.id() == message.job_id) else {
            debug!(job_id = %message.job_id, "event for removed job dropped");
            return;
        };
        if job.run_count() != message.run {
            debug!(job_id = %message.job_id, run = message.run, "stale event dropped");
            return;
        }
        job.handle(message.event, is_active, &self.env);
    }

    /// Apply every queued worker event without waiting.
    ///
    /// # Returns
    ///
    /// The number of events applied.
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(message) = self.messages_rx.try_recv() {
            self.dispatch(message);
            count += 1;
        }
        count
    }

    /// Wait for the next worker event and apply it.
    pub async fn next_event(&mut self) -> bool {
        match self.messages_rx.recv().await {
            Some(message) => {
                self.dispatch(message);
                true
            }
            None => false,
        }
    }

    /// Apply worker events until `predicate` holds for the job.
    ///
    /// # Errors
    ///
    /// Returns `JobError::Timeout` if it does not hold within `timeout`.
    pub async fn wait_until<F>(&mut self, id: Uuid, timeout: Duration, predicate: F) -> JobResult<()>
    where
        F: Fn(&JobContext) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let job = self.job(id).ok_or(JobError::JobNotFound(id))?;
            if predicate(job) {
                return Ok(());
            }
            let status = job.status();
            match timeout_at(deadline, self.messages_rx.recv()).await {
                Ok(Some(message)) => self.dispatch(message),
                Ok(None) | Err(_) => return Err(JobError::Timeout { job_id: id, status }),
            }
        }
    }

    /// Apply worker events until the job status satisfies `predicate`.
    pub async fn wait_for_status<F>(
        &mut self,
        id: Uuid,
        timeout: Duration,
        predicate: F,
    ) -> JobResult<RunnerStatus>
    where
        F: Fn(RunnerStatus) -> bool,
    {
        self.wait_until(id, timeout, |job| predicate(job.status()))
            .await?;
        self.job(id)
            .map(JobContext::status)
            .ok_or(JobError::JobNotFound(id))
    }

    /// Wait until the job's worker is gone and its status is final.
    pub async fn wait_for_finished(&mut self, id: Uuid, timeout: Duration) -> JobResult<RunnerStatus> {
        self.wait_for_status(id, timeout, RunnerStatus::is_finished)
            .await
    }

    /// Serve GUI operations until `Op::Shutdown` or until `ops` closes.
    ///
    /// Worker events are applied as they arrive. Failing operations are
    /// logged and do not end the loop.
    pub async fn run(&mut self, mut ops: UnboundedReceiver<Op>) {
        loop {
            tokio::select! {
                op = ops.recv() => match op {
                    None | Some(Op::Shutdown) => break,
                    Some(op) => {
                        if let Err(e) = self.handle_op(op) {
                            warn!("operation failed: {e}");
                        }
                    }
                },
                Some(message) = self.messages_rx.recv() => self.dispatch(message),
            }
        }
        self.shutdown().await;
    }

    /// Stop every job and join every worker.
    ///
    /// Workers get `shutdown_timeout_msec` to report completion; the ones
    /// that did not are joined anyway.
    pub async fn shutdown(&mut self) {
        self.stop_all_jobs();

        let timeout = Duration::from_millis(self.env.config.shutdown_timeout_msec);
        let deadline = Instant::now() + timeout;
        while self.has_running_jobs() {
            match timeout_at(deadline, self.messages_rx.recv()).await {
                Ok(Some(message)) => self.dispatch(message),
                Ok(None) | Err(_) => break,
            }
        }
        if self.has_running_jobs() {
            warn!("workers did not finish within {timeout:?}, joining");
        }

        self.join_all();
        self.process_pending();
    }

    fn join_all(&mut self) {
        for job in &mut self.jobs {
            job.join_worker();
        }
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.stop_all_jobs();
        self.join_all();
    }
}
