//! Size-bounded batch accumulator.

use engine_core::{Batch, Item};

/// Collects items until the threshold is reached, then seals a batch.
#[derive(Debug)]
pub struct BatchAccumulator {
    threshold: usize,
    pending: Vec<Item>,
}

impl BatchAccumulator {
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            pending: Vec::with_capacity(threshold),
        }
    }

    /// Adds an item; returns the sealed batch once the threshold is reached.
    pub fn add(&mut self, item: Item) -> Option<Batch> {
        self.pending.push(item);
        if self.pending.len() >= self.threshold {
            let items = std::mem::replace(&mut self.pending, Vec::with_capacity(self.threshold));
            return Some(Batch::seal(items));
        }
        None
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}
