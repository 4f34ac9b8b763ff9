//! Items produced by sources and accepted at ingress.
//!
//! Accepts payloads in 2 shapes:
//! 1. Single item: `{ "created_at": "...", "content": "...", ... }`
//! 2. Array: `[item, item, ...]`
//!
//! Each element is validated on its own, so one malformed element never
//! takes the rest of the request down with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error::{Error, Result, ValidationErrorCode};
use crate::limits::{MAX_ITEMS_PER_REQUEST, MAX_ITEM_SIZE_BYTES};

/// A piece of content fetched from a source.
///
/// The engine never looks inside the payload beyond validation; ownership moves
/// from the worker to the ingestion queue on push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Item {
    /// Publication time, RFC 3339.
    #[validate(custom(function = "validate_rfc3339"))]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1000))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100000))]
    pub content: String,
    #[validate(length(min = 1, max = 253))]
    pub domain: String,
    #[validate(url)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 5000))]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 256))]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_parent_id: Option<String>,
}

fn validate_rfc3339(value: &str) -> std::result::Result<(), ValidationError> {
    DateTime::parse_from_rfc3339(value)
        .map(|_| ())
        .map_err(|_| ValidationError::new("rfc3339"))
}

impl Item {
    /// Publication time, if the stored string parses.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Converts a raw JSON value into a validated item.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let size = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0);
        if size > MAX_ITEM_SIZE_BYTES {
            return Err(Error::malformed(
                ValidationErrorCode::ItemTooLarge,
                format!(
                    "Item size {}KB exceeds {}KB limit",
                    size / 1024,
                    MAX_ITEM_SIZE_BYTES / 1024
                ),
            ));
        }

        let item: Item = serde_json::from_value(value).map_err(|e| {
            let code = if e.to_string().starts_with("missing field") {
                ValidationErrorCode::MissingField
            } else {
                ValidationErrorCode::InvalidFormat
            };
            Error::malformed(code, e.to_string())
        })?;

        item.validate().map_err(|e| {
            Error::malformed(ValidationErrorCode::InvalidFormat, e.to_string())
        })?;

        Ok(item)
    }
}

/// Outcome of parsing one ingress request.
#[derive(Debug, Default)]
pub struct ParsedItems {
    pub items: Vec<Item>,
    pub rejected: Vec<Error>,
}

impl ParsedItems {
    /// Parses a request body holding one item or an array of items.
    ///
    /// Fails as a whole only when the body is not JSON or has the wrong shape.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
            Error::malformed(ValidationErrorCode::InvalidFormat, e.to_string())
        })?;

        let values = match value {
            serde_json::Value::Array(values) => values,
            value @ serde_json::Value::Object(_) => vec![value],
            _ => {
                return Err(Error::malformed(
                    ValidationErrorCode::InvalidFormat,
                    "Expected an item object or an array of items",
                ))
            }
        };

        if values.len() > MAX_ITEMS_PER_REQUEST {
            return Err(Error::malformed(
                ValidationErrorCode::ItemTooLarge,
                format!(
                    "Request has {} items, exceeds {} limit",
                    values.len(),
                    MAX_ITEMS_PER_REQUEST
                ),
            ));
        }

        let mut parsed = ParsedItems::default();
        for value in values {
            match Item::from_value(value) {
                Ok(item) => parsed.items.push(item),
                Err(e) => parsed.rejected.push(e),
            }
        }
        Ok(parsed)
    }
}
