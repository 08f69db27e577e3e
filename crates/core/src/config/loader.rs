//! Configuration loader for the `.oac-tree-gui/` directory.
//!
//! The directory may contain:
//! - `config.toml`: Global settings
//! - `procedures/*.json`, `procedures/*.yaml`, `procedures/*.yml`: Procedures

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use ot_protocol::config_models::GlobalConfig;
use ot_protocol::procedure_models::ProcedureDefinition;
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Name of the configuration directory below a project root.
pub const CONFIG_DIR: &str = ".oac-tree-gui";

/// Loads all configuration from the `.oac-tree-gui/` directory.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.oac-tree-gui/` folder
///
/// # Returns
///
/// An `AppConfig` with the global settings and every procedure found. A
/// missing directory, `config.toml` or `procedures/` folder yields the
/// defaults rather than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - Files exist but cannot be read
/// - Files have invalid TOML, JSON or YAML syntax
/// - Settings are out of range or two procedures share a name
///
/// # Example
///
/// ```rust,no_run
/// use ot_core::config::loader::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Jobs pace at {} msec", config.global.tick_timeout_msec);
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_dir = root.join(CONFIG_DIR);

    if !config_dir.exists() {
        return Ok(AppConfig::default());
    }

    let global = load_global_config(&config_dir)?;
    let procedures = load_procedures(&config_dir)?;
    debug!(procedures = procedures.len(), "configuration loaded");

    Ok(AppConfig { global, procedures })
}

fn load_global_config(config_dir: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = config_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: GlobalConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.clone(),
            source,
        })?;

    validate_global_config(&config).map_err(|reason| ConfigError::InvalidConfig {
        path: config_path,
        reason,
    })?;

    Ok(config)
}

fn validate_global_config(config: &GlobalConfig) -> Result<(), String> {
    if config.shutdown_timeout_msec == 0 {
        return Err("shutdown_timeout_msec must be positive".to_string());
    }
    if config.log_source.trim().is_empty() {
        return Err("log_source must not be empty".to_string());
    }
    let type_names = config
        .extra_instruction_types
        .iter()
        .chain(&config.extra_variable_types);
    for name in type_names {
        if name.trim().is_empty() {
            return Err("type names must not be empty".to_string());
        }
    }
    Ok(())
}

/// Loads every procedure from `procedures/`, sorted by file name.
fn load_procedures(config_dir: &Path) -> ConfigResult<Vec<ProcedureDefinition>> {
    let procedures_dir = config_dir.join("procedures");

    if !procedures_dir.exists() {
        return Ok(Vec::new());
    }

    let mut procedures = Vec::new();
    let mut names = HashSet::new();

    for entry in WalkDir::new(&procedures_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: procedures_dir.clone(),
            source,
        })?;

        let path = entry.path();
        let ext = path.extension().and_then(|s| s.to_str());
        if !matches!(ext, Some("json" | "yaml" | "yml")) {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let procedure: ProcedureDefinition = if ext == Some("json") {
            serde_json::from_str(&content).map_err(|source| ConfigError::JsonParse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            serde_yaml::from_str(&content).map_err(|source| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?
        };

        if !names.insert(procedure.name.clone()) {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("duplicate procedure name '{}'", procedure.name),
            });
        }
        procedures.push(procedure);
    }

    Ok(procedures)
}
