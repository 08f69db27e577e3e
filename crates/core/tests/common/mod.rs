//! Common test utilities for job manager integration tests.
//!
//! This module provides shared functionality across the tests:
//! - Fixtures (procedures, managers, config directories)
//! - Event and log assertions
//! - Mock runtimes, factories and message sinks

pub mod assertions;
pub mod fixtures;
pub mod mock_runtimes;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_runtimes::*;
