//! Built-in source implementations.

pub mod http;

pub use http::{HttpFeedSource, SourceRegistration};
