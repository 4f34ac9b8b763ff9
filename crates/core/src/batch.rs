//! Batches handed to the downstream collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::item::Item;

/// An item tagged with its 1-based position inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub position: u32,
    pub item: Item,
}

/// Ordered, immutable group of items.
///
/// Only created at flush time; fields are read-only from the outside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    id: Uuid,
    created_at: DateTime<Utc>,
    items: Vec<BatchItem>,
}

impl Batch {
    /// Tags items with positions 1..=n in the order given.
    pub fn seal(items: Vec<Item>) -> Self {
        let items = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| BatchItem {
                position: i as u32 + 1,
                item,
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            items,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<BatchItem> {
        self.items
    }
}
