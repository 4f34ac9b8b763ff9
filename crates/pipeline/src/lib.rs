//! Ingestion queue and batch aggregator for the harvest engine.

pub mod aggregator;
pub mod batch;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod queue;

pub use aggregator::*;
pub use batch::BatchAccumulator;
pub use config::PipelineConfig;
pub use dispatcher::*;
pub use executor::DispatchExecutor;
pub use queue::*;
