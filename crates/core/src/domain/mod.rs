//! Seams to the domain execution engine.
//!
//! The engine that actually executes procedures lives outside this crate.
//! This module defines what the job machinery needs from it:
//! - [`DomainRuntime`]: one executable procedure instance
//! - [`DomainObserver`]: the callbacks the runtime invokes while running
//! - [`RuntimeFactory`]: creates a fresh runtime for every run
//! - [`registry::DomainRegistry`]: the instruction and variable types
//!   procedures may use
//!
//! [`scripted::ScriptedRuntime`] implements the runtime for tests and demos.

pub mod registry;
pub mod scripted;

use ot_protocol::log_models::Severity;
use ot_protocol::procedure_models::{InstructionStatus, ProcedureDefinition};
use ot_protocol::request_models::{UserChoiceArgs, UserInputArgs};
use serde_json::Value;
use std::sync::Arc;

/// How a run of the domain runtime ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Succeeded,
    Failed,
    /// The run honoured a [`DomainRuntime::halt`] request.
    Halted,
}

/// Callback surface invoked by a [`DomainRuntime`] on its own thread.
///
/// Every call happens synchronously from within [`DomainRuntime::run`].
/// The user requests block the calling thread until the operator answers;
/// `None` means the request was not processed.
pub trait DomainObserver {
    fn on_instruction_status_changed(&self, index: u32, status: InstructionStatus);

    /// `value` is only borrowed for the duration of the call.
    fn on_variable_updated(&self, name: &str, value: &Value, connected: bool);

    fn on_user_input_request(&self, args: UserInputArgs) -> Option<Value>;

    fn on_user_choice_request(&self, args: UserChoiceArgs) -> Option<usize>;

    fn on_single_step_start(&self);

    /// Wait point between two steps; may block.
    fn on_single_step_end(&self);

    /// Instructions that execute next, by pre-order index.
    fn on_next_instructions(&self, indices: &[u32]);

    fn on_message(&self, text: &str);

    fn on_log(&self, severity: Severity, text: &str);

    fn on_put_value(&self, value: &Value, description: &str);
}

/// One executable instance of a procedure.
pub trait DomainRuntime: Send + Sync {
    /// Executes the procedure to completion on the calling thread.
    ///
    /// # Errors
    ///
    /// Any error is reported as a failed run.
    fn run(&self, observer: &dyn DomainObserver) -> anyhow::Result<TerminalState>;

    /// Requests a cooperative stop; may be called from any thread.
    fn halt(&self);
}

/// Creates a fresh runtime for every run of a job.
pub trait RuntimeFactory: Send + Sync {
    /// # Errors
    ///
    /// A failure is reported as a submit failure of the job.
    fn create(&self, procedure: &ProcedureDefinition) -> anyhow::Result<Arc<dyn DomainRuntime>>;
}

impl<F> RuntimeFactory for F
where
    F: Fn(&ProcedureDefinition) -> anyhow::Result<Arc<dyn DomainRuntime>> + Send + Sync,
{
    fn create(&self, procedure: &ProcedureDefinition) -> anyhow::Result<Arc<dyn DomainRuntime>> {
        self(procedure)
    }
}
