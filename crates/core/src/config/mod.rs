//! Configuration loading.
//!
//! Global settings and procedure files are read from the `.oac-tree-gui/`
//! directory of a project root.

pub mod error;
pub mod loader;
pub mod models;
