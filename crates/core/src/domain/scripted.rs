//! Scripted domain runtime for testing and demos.
//!
//! A [`ScriptedRuntime`] plays a list of [`ScriptStep`]s against the
//! observer. Each step is framed by `on_single_step_start` and
//! `on_single_step_end`, so pacing and stepping behave as with a real
//! engine.

use crate::domain::{DomainObserver, DomainRuntime, RuntimeFactory, TerminalState};
use anyhow::bail;
use ot_protocol::log_models::Severity;
use ot_protocol::procedure_models::{InstructionStatus, ProcedureDefinition};
use ot_protocol::request_models::{UserChoiceArgs, UserInputArgs};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// The instruction becomes active, then settles in `status`.
    ///
    /// A `Failure` ends the run as failed.
    Instruction { index: u32, status: InstructionStatus },
    SetVariable { name: String, value: Value },
    UserChoice { options: Vec<String> },
    UserInput { value: Value, description: String },
    Message(String),
    Log(Severity, String),
    PutValue { value: Value, description: String },
    /// Sleeps, waking up early on halt.
    Sleep(Duration),
    /// Reports an error from `run`.
    Fail(String),
    Panic(String),
}

/// What the runtime received for a user request.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptAnswer {
    Choice(Option<usize>),
    Input(Option<Value>),
}

#[derive(Debug)]
pub struct ScriptedRuntime {
    steps: Vec<ScriptStep>,
    halted: Mutex<bool>,
    wake: Condvar,
    executed: AtomicUsize,
    answers: Mutex<Vec<ScriptAnswer>>,
}

impl ScriptedRuntime {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            halted: Mutex::new(false),
            wake: Condvar::new(),
            executed: AtomicUsize::new(0),
            answers: Mutex::new(Vec::new()),
        }
    }

    /// Sets every variable to its initial value, then runs every
    /// instruction in pre-order.
    ///
    /// `UserChoice` asks for one of its children's names and `Input` for a
    /// value before completing. `Fail` ends the run as failed. Every other
    /// instruction succeeds.
    pub fn from_procedure(procedure: &ProcedureDefinition) -> Self {
        let mut steps = Vec::new();
        for variable in &procedure.variables {
            let value = variable
                .value
                .as_deref()
                .and_then(|v| serde_json::from_str(v).ok())
                .unwrap_or(Value::Null);
            steps.push(ScriptStep::SetVariable {
                name: variable.name.clone(),
                value,
            });
        }
        for (index, instruction) in procedure.instructions_preorder().into_iter().enumerate() {
            let mut status = InstructionStatus::Success;
            match instruction.type_name.as_str() {
                "UserChoice" => steps.push(ScriptStep::UserChoice {
                    options: instruction.children.iter().map(|c| c.name.clone()).collect(),
                }),
                "Input" => steps.push(ScriptStep::UserInput {
                    value: Value::Null,
                    description: instruction.name.clone(),
                }),
                "Fail" => status = InstructionStatus::Failure,
                _ => {}
            }
            steps.push(ScriptStep::Instruction {
                index: index as u32,
                status,
            });
        }
        Self::new(steps)
    }

    /// Steps completed so far.
    pub fn executed_steps(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }

    pub fn answers(&self) -> Vec<ScriptAnswer> {
        self.lock_answers().clone()
    }

    pub fn is_halted(&self) -> bool {
        *self.lock_halted()
    }

    fn lock_halted(&self) -> MutexGuard<'_, bool> {
        self.halted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_answers(&self) -> MutexGuard<'_, Vec<ScriptAnswer>> {
        self.answers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, duration: Duration) {
        let halted = self.lock_halted();
        let _guard = self
            .wake
            .wait_timeout_while(halted, duration, |halted| !*halted)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Plays one step. `Ok(Some(state))` ends the run.
    fn play(
        &self,
        step: &ScriptStep,
        observer: &dyn DomainObserver,
    ) -> anyhow::Result<Option<TerminalState>> {
        match step {
            ScriptStep::Instruction { index, status } => {
                observer.on_next_instructions(&[*index]);
                observer.on_instruction_status_changed(*index, InstructionStatus::NotFinished);
                observer.on_instruction_status_changed(*index, *status);
                if *status == InstructionStatus::Failure {
                    return Ok(Some(TerminalState::Failed));
                }
            }
            ScriptStep::SetVariable { name, value } => {
                observer.on_variable_updated(name, value, true);
            }
            ScriptStep::UserChoice { options } => {
                let answer = observer.on_user_choice_request(UserChoiceArgs {
                    options: options.clone(),
                    metadata: String::new(),
                });
                self.lock_answers().push(ScriptAnswer::Choice(answer));
                if answer.is_none() {
                    return self.unanswered("user choice");
                }
            }
            ScriptStep::UserInput { value, description } => {
                let answer = observer.on_user_input_request(UserInputArgs {
                    value: value.to_string(),
                    description: description.clone(),
                });
                let processed = answer.is_some();
                self.lock_answers().push(ScriptAnswer::Input(answer));
                if !processed {
                    return self.unanswered("user input");
                }
            }
            ScriptStep::Message(text) => observer.on_message(text),
            ScriptStep::Log(severity, text) => observer.on_log(*severity, text),
            ScriptStep::PutValue { value, description } => {
                observer.on_put_value(value, description);
            }
            ScriptStep::Sleep(duration) => self.sleep(*duration),
            ScriptStep::Fail(reason) => bail!("{reason}"),
            ScriptStep::Panic(reason) => panic!("{reason}"),
        }
        Ok(None)
    }

    fn unanswered(&self, what: &str) -> anyhow::Result<Option<TerminalState>> {
        if self.is_halted() {
            Ok(Some(TerminalState::Halted))
        } else {
            bail!("{what} was not processed")
        }
    }
}

impl DomainRuntime for ScriptedRuntime {
    fn run(&self, observer: &dyn DomainObserver) -> anyhow::Result<TerminalState> {
        for step in &self.steps {
            if self.is_halted() {
                return Ok(TerminalState::Halted);
            }
            observer.on_single_step_start();
            let end = self.play(step, observer)?;
            self.executed.fetch_add(1, Ordering::SeqCst);
            if let Some(state) = end {
                return Ok(state);
            }
            observer.on_single_step_end();
        }

        if self.is_halted() {
            return Ok(TerminalState::Halted);
        }
        observer.on_next_instructions(&[]);
        Ok(TerminalState::Succeeded)
    }

    fn halt(&self) {
        *self.lock_halted() = true;
        self.wake.notify_all();
    }
}

/// Creates a [`ScriptedRuntime`] with the same script for every run and
/// keeps each one for inspection.
#[derive(Debug, Default)]
pub struct ScriptFactory {
    steps: Option<Vec<ScriptStep>>,
    created: Mutex<Vec<Arc<ScriptedRuntime>>>,
}

impl ScriptFactory {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: Some(steps),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Derives the script of every run from the submitted procedure.
    pub fn from_procedures() -> Self {
        Self::default()
    }

    /// The runtime of the most recent run.
    pub fn last(&self) -> Option<Arc<ScriptedRuntime>> {
        self.lock().last().cloned()
    }

    pub fn created_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<ScriptedRuntime>>> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RuntimeFactory for ScriptFactory {
    fn create(&self, procedure: &ProcedureDefinition) -> anyhow::Result<Arc<dyn DomainRuntime>> {
        let runtime = Arc::new(match &self.steps {
            Some(steps) => ScriptedRuntime::new(steps.clone()),
            None => ScriptedRuntime::from_procedure(procedure),
        });
        self.lock().push(Arc::clone(&runtime));
        Ok(runtime)
    }
}
