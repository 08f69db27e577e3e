//! Aggregated configuration of a project root.

use ot_protocol::config_models::GlobalConfig;
use ot_protocol::procedure_models::ProcedureDefinition;

/// Everything loaded from the `.oac-tree-gui/` directory.
///
/// # Example
///
/// ```rust,no_run
/// use ot_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} procedures", config.procedures.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// Global settings from `config.toml`.
    pub global: GlobalConfig,

    /// Procedures from `procedures/*.{json,yaml,yml}`, sorted by file name.
    pub procedures: Vec<ProcedureDefinition>,
}

impl AppConfig {
    pub fn procedure(&self, name: &str) -> Option<&ProcedureDefinition> {
        self.procedures.iter().find(|p| p.name == name)
    }
}
