//! Shared test utilities for reportflow integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs with a temp incoming directory and database
//! - `ConfigBuilder` for producing configuration files programmatically
//! - Fake analysis engines, both in-process and as shell scripts

pub mod builders;
pub mod engines;
pub mod harness;

pub use builders::*;
pub use engines::*;
pub use harness::TestHarness;
