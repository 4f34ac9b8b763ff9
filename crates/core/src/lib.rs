//! Core types, errors, and validation for the harvest engine.

pub mod batch;
pub mod catalog;
pub mod clock;
pub mod error;
pub mod item;
pub mod limits;
pub mod source;

pub use batch::*;
pub use catalog::*;
pub use clock::*;
pub use error::{Error, Result};
pub use item::*;
pub use source::*;
