//! Shared harness for the harvest engine integration tests.

pub mod fixtures;
pub mod mocks;
pub mod setup;
