//! Unified error types for the harvest engine.
//!
//! Error codes:
//! - CONFIG_001: Remote configuration fetch failed
//! - WORKER_001: Source worker fault
//! - DISPATCH_001-002: Batch dispatch failed / timed out
//! - VALID_001-003: Item validation errors
//! - SOURCE_001: Unknown source module

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation error codes for ingress items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorCode {
    /// VALID_001: Invalid JSON / Invalid format
    InvalidFormat,
    /// VALID_002: Required field missing or empty
    MissingField,
    /// VALID_003: Item exceeds the size limit
    ItemTooLarge,
}

impl ValidationErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "VALID_001",
            Self::MissingField => "VALID_002",
            Self::ItemTooLarge => "VALID_003",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ItemTooLarge => 413,
            _ => 400,
        }
    }
}

/// Unified error type for the harvest engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Network, non-2xx, or parse failure while reading remote configuration.
    #[error("[CONFIG_001] failed to fetch {url}: {message}")]
    ConfigFetch { url: String, message: String },

    /// Any fault inside a source worker's fetch loop.
    #[error("[WORKER_001] worker fault in {source_id}: {message}")]
    WorkerFault { source_id: String, message: String },

    /// Downstream collaborator reported a failure.
    #[error("[DISPATCH_001] batch {batch_id} dispatch failed: {message}")]
    Dispatch { batch_id: String, message: String },

    /// Downstream collaborator did not answer in time; the batch is dropped.
    #[error("[DISPATCH_002] batch {batch_id} dispatch timed out after {timeout:?}")]
    DispatchTimeout {
        batch_id: String,
        timeout: std::time::Duration,
    },

    /// Item rejected at ingress.
    #[error("[{code}] {message}")]
    MalformedItem {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    /// A source identifier with no registered implementation.
    #[error("[SOURCE_001] unknown source module: {0}")]
    UnknownSource(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config_fetch(url: impl Into<String>, msg: impl ToString) -> Self {
        Self::ConfigFetch {
            url: url.into(),
            message: msg.to_string(),
        }
    }

    pub fn worker_fault(source_id: impl Into<String>, msg: impl ToString) -> Self {
        Self::WorkerFault {
            source_id: source_id.into(),
            message: msg.to_string(),
        }
    }

    pub fn dispatch(batch_id: impl ToString, msg: impl ToString) -> Self {
        Self::Dispatch {
            batch_id: batch_id.to_string(),
            message: msg.to_string(),
        }
    }

    pub fn dispatch_timeout(batch_id: impl ToString, timeout: std::time::Duration) -> Self {
        Self::DispatchTimeout {
            batch_id: batch_id.to_string(),
            timeout,
        }
    }

    /// Create an item validation error.
    pub fn malformed(code: ValidationErrorCode, msg: impl Into<String>) -> Self {
        Self::MalformedItem {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn unknown_source(id: impl Into<String>) -> Self {
        Self::UnknownSource(id.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MalformedItem { http_status, .. } => *http_status,
            Self::Serialization(_) => 400,
            Self::UnknownSource(_) => 404,
            Self::ConfigFetch { .. } => 502,
            Self::DispatchTimeout { .. } => 504,
            Self::WorkerFault { .. }
            | Self::Dispatch { .. }
            | Self::Io(_)
            | Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::ConfigFetch { .. } => Some("CONFIG_001"),
            Self::WorkerFault { .. } => Some("WORKER_001"),
            Self::Dispatch { .. } => Some("DISPATCH_001"),
            Self::DispatchTimeout { .. } => Some("DISPATCH_002"),
            Self::MalformedItem { code, .. } => Some(code),
            Self::Serialization(_) => Some(ValidationErrorCode::InvalidFormat.code()),
            Self::UnknownSource(_) => Some("SOURCE_001"),
            _ => None,
        }
    }

    /// Whether a caller may retry or fall back instead of giving up.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::UnknownSource(_) | Self::MalformedItem { .. })
    }
}
