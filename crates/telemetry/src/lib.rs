//! In-process telemetry for the harvest engine.
//!
//! Metrics stay in memory and are exposed as a JSON snapshot; nothing is
//! exported to an external system.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
