//! Registry of instruction and variable types.
//!
//! Procedures are checked against a [`DomainRegistry`] before a job is
//! accepted. The registry is an explicit object shared by `Arc`; there is no
//! process-wide instance.

use crate::error::{JobError, JobResult};
use ot_protocol::config_models::GlobalConfig;
use ot_protocol::procedure_models::ProcedureDefinition;
use std::collections::{BTreeSet, HashSet};

/// Instruction types every registry created by
/// [`DomainRegistry::with_standard_types`] knows.
pub const STANDARD_INSTRUCTIONS: &[&str] = &[
    "Sequence",
    "Fallback",
    "Parallel",
    "Repeat",
    "Inverter",
    "ForceSuccess",
    "Async",
    "Include",
    "Wait",
    "Message",
    "Log",
    "Output",
    "Input",
    "UserChoice",
    "Copy",
    "Equals",
    "LessThan",
    "GreaterThan",
    "Increment",
    "Decrement",
    "Condition",
    "Listen",
    "ResetVariable",
    "Succeed",
    "Fail",
];

pub const STANDARD_VARIABLES: &[&str] = &["Local", "File"];

#[derive(Debug, Clone, Default)]
pub struct DomainRegistry {
    instructions: BTreeSet<String>,
    variables: BTreeSet<String>,
}

impl DomainRegistry {
    /// An empty registry; every procedure using a type is rejected.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_standard_types() -> Self {
        let mut registry = Self::new();
        for name in STANDARD_INSTRUCTIONS {
            registry.register_instruction(*name);
        }
        for name in STANDARD_VARIABLES {
            registry.register_variable(*name);
        }
        registry
    }

    /// Standard types plus the extra types named in `config`.
    pub fn from_config(config: &GlobalConfig) -> Self {
        let mut registry = Self::with_standard_types();
        for name in &config.extra_instruction_types {
            registry.register_instruction(name.as_str());
        }
        for name in &config.extra_variable_types {
            registry.register_variable(name.as_str());
        }
        registry
    }

    pub fn register_instruction(&mut self, type_name: impl Into<String>) {
        self.instructions.insert(type_name.into());
    }

    pub fn register_variable(&mut self, type_name: impl Into<String>) {
        self.variables.insert(type_name.into());
    }

    pub fn has_instruction(&self, type_name: &str) -> bool {
        self.instructions.contains(type_name)
    }

    pub fn has_variable(&self, type_name: &str) -> bool {
        self.variables.contains(type_name)
    }

    /// Checks that `procedure` can be submitted.
    ///
    /// # Errors
    ///
    /// `JobError::SubmitFailure` naming the first problem found.
    pub fn validate(&self, procedure: &ProcedureDefinition) -> JobResult<()> {
        let reject = |reason: String| Err(JobError::SubmitFailure(reason));

        if procedure.name.trim().is_empty() {
            return reject("procedure has no name".to_string());
        }
        if procedure.instructions.is_empty() {
            return reject(format!("procedure '{}' has no instructions", procedure.name));
        }

        for instruction in procedure.instructions_preorder() {
            if !self.has_instruction(&instruction.type_name) {
                return reject(format!(
                    "unknown instruction type '{}'",
                    instruction.type_name
                ));
            }
        }

        let mut names = HashSet::new();
        for variable in &procedure.variables {
            if !self.has_variable(&variable.type_name) {
                return reject(format!("unknown variable type '{}'", variable.type_name));
            }
            if !names.insert(variable.name.as_str()) {
                return reject(format!("duplicate variable name '{}'", variable.name));
            }
            if let Some(value) = &variable.value {
                if let Err(e) = serde_json::from_str::<serde_json::Value>(value) {
                    return reject(format!(
                        "variable '{}' has an invalid value: {e}",
                        variable.name
                    ));
                }
            }
        }

        Ok(())
    }
}
