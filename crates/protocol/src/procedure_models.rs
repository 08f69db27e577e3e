//! Procedure definition models.
//!
//! A procedure is a tree of instructions plus a workspace of variables. The
//! GUI submits a [`ProcedureDefinition`] to create a job; the domain runtime
//! executes it.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Execution status of a single instruction as reported by the domain.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstructionStatus {
    #[default]
    NotStarted,
    NotFinished,
    Running,
    Success,
    Failure,
}

impl InstructionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InstructionStatus::NotStarted => "Not started",
            InstructionStatus::NotFinished => "Not finished",
            InstructionStatus::Running => "Running",
            InstructionStatus::Success => "Success",
            InstructionStatus::Failure => "Failure",
        }
    }

    /// True once the instruction has started but not completed.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            InstructionStatus::NotFinished | InstructionStatus::Running
        )
    }
}

impl fmt::Display for InstructionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the instruction tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct InstructionDefinition {
    /// Registered instruction type, e.g. `Sequence` or `Wait`.
    pub type_name: String,

    /// Display name; may be empty.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub children: Vec<InstructionDefinition>,
}

impl InstructionDefinition {
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: InstructionDefinition) -> Self {
        self.children.push(child);
        self
    }
}

/// A workspace variable.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "kebab-case")]
pub struct VariableDefinition {
    pub name: String,

    /// Registered variable type, e.g. `Local`.
    pub type_name: String,

    /// Initial value as a JSON document.
    #[serde(default)]
    pub value: Option<String>,
}

/// A complete procedure as submitted by the GUI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct ProcedureDefinition {
    pub name: String,

    /// Root instructions; usually exactly one.
    pub instructions: Vec<InstructionDefinition>,

    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
}

impl ProcedureDefinition {
    /// Visits all instructions in pre-order.
    ///
    /// The visiting order defines the instruction index used by every
    /// instruction event.
    pub fn instructions_preorder(&self) -> Vec<&InstructionDefinition> {
        fn visit<'a>(node: &'a InstructionDefinition, out: &mut Vec<&'a InstructionDefinition>) {
            out.push(node);
            for child in &node.children {
                visit(child, out);
            }
        }

        let mut result = Vec::new();
        for root in &self.instructions {
            visit(root, &mut result);
        }
        result
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions_preorder().len()
    }
}
