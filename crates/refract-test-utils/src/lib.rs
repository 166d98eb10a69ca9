//! Utilities shared by Refract tests.
//!
//! Fixture helpers for refactoring tests (selection markers, multi-file fixtures, fixture
//! directories) and a guard for tests that touch process environment variables.

mod env;
mod fixtures;

pub use env::{env_lock, EnvVarGuard};
pub use fixtures::*;
