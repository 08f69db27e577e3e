//! Global configuration models for `.oac-tree-gui/config.toml`.
//!
//! This module defines the structure of the global configuration file that
//! controls how jobs are paced, logged and torn down.

use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

/// Represents global settings from `.oac-tree-gui/config.toml`.
///
/// All fields are optional in the file; missing fields take the values of
/// [`GlobalConfig::default`].
///
/// # Example
///
/// ```toml
/// # .oac-tree-gui/config.toml
/// tick_timeout_msec = 200
/// clear_log_on_start = false
/// extra_instruction_types = ["ChannelAccessRead"]
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(default)]
pub struct GlobalConfig {
    /// Delay between two steps of a newly started job, in milliseconds.
    ///
    /// Zero runs jobs at full speed.
    pub tick_timeout_msec: u64,

    /// How long teardown waits for a stopped worker to report completion.
    pub shutdown_timeout_msec: u64,

    /// Empty the job log each time a job is (re)started.
    pub clear_log_on_start: bool,

    /// Source field of log events produced by the job machinery.
    pub log_source: String,

    /// Instruction types accepted in addition to the standard set.
    pub extra_instruction_types: Vec<String>,

    /// Variable types accepted in addition to the standard set.
    pub extra_variable_types: Vec<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            tick_timeout_msec: 0,
            shutdown_timeout_msec: 5000,
            clear_log_on_start: true,
            log_source: "oac-tree".to_string(),
            extra_instruction_types: Vec::new(),
            extra_variable_types: Vec::new(),
        }
    }
}
