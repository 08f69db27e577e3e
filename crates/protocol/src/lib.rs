//! # ot-protocol
//!
//! Core protocol definitions and data models for the oac-tree job monitor.
//!
//! This crate defines all shared data structures used for:
//! - Procedure definitions submitted as jobs
//! - Runtime job status and log events
//! - User requests raised by running procedures
//! - Communication between the GUI and the job core
//!
//! ## Modules
//!
//! - [`config_models`]: Global configuration from config.toml
//! - [`log_models`]: Severity and log events
//! - [`procedure_models`]: Procedures, instructions and variables
//! - [`request_models`]: User choice and user input requests
//! - [`runner_status`]: Job execution status
//! - [`ipc`]: Operations and Events for GUI-core communication
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs, uuid and chrono
//! - TypeScript generation: All types derive `TS` for client compatibility
//! - Independent compilation: No dependencies on other workspace crates

pub mod config_models;
pub mod ipc;
pub mod log_models;
pub mod procedure_models;
pub mod request_models;
pub mod runner_status;

// Re-export all public types for convenience
pub use config_models::*;
pub use ipc::*;
pub use log_models::*;
pub use procedure_models::*;
pub use request_models::*;
pub use runner_status::*;
