//! # ot-core
//!
//! Job execution and monitoring core for oac-tree procedures.
//!
//! This crate provides:
//! - Flow control of a running procedure (run, pause, step, stop, pacing)
//! - One-shot request handlers that block a worker until the GUI answers
//! - Translation of domain callbacks into events for the GUI thread
//! - Job contexts and the job manager owning them
//! - Configuration loading from the `.oac-tree-gui/` directory
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading
//! - [`domain`]: Domain runtime seam, type registry and scripted runtime
//! - [`flow`]: Flow controller
//! - [`request`]: Request handlers
//! - [`log`]: Job log
//! - [`observer`]: Domain observer posting events to the GUI thread
//! - [`job`]: Job context and worker thread
//! - [`manager`]: Job manager

pub mod config;
pub mod domain;
pub mod error;
pub mod flow;
pub mod job;
pub mod log;
pub mod manager;
pub mod observer;
pub mod request;

pub use error::{JobError, JobResult, RequestError};
pub use job::JobContext;
pub use manager::JobManager;
