//! Source workers for the harvest engine.
//!
//! - Source registry and the built-in HTTP feed source
//! - Keyword selection (topic-language, topic, uniform)
//! - Worker pool scheduling against remote concurrency targets
//! - Supervision of long-running loops

pub mod config;
pub mod scheduler;
pub mod selector;
pub mod source;
pub mod sources;
pub mod supervisor;
pub mod task;

pub use config::WorkerConfig;
pub use scheduler::*;
pub use selector::KeywordSelector;
pub use source::*;
pub use supervisor::Supervisor;
pub use task::{TaskEvent, TaskState, WorkerContext};
