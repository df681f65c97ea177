//! Pending deal queue
//!
//! Ordered collection of offers awaiting activation, at most one entry per
//! (party, listing) key. A newer offer for the same key replaces the older
//! one at the tail; FIFO order of first arrival is otherwise preserved.

use std::collections::VecDeque;

use crate::types::{DealKey, OfferEvent};

/// FIFO of not-yet-handled offers, deduplicated by deal key
#[derive(Debug, Default)]
pub struct PendingDeals {
    deals: VecDeque<OfferEvent>,
}

impl PendingDeals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any entry with the same key, then append `event` at the tail.
    pub fn enqueue_or_replace(&mut self, event: OfferEvent) {
        self.remove(&event.key());
        self.deals.push_back(event);
    }

    /// Remove the entry with the given key, if present.
    pub fn remove(&mut self, key: &DealKey) {
        self.deals.retain(|deal| deal.key() != *key);
    }

    /// Remove and return the head entry.
    pub fn pop_front(&mut self) -> Option<OfferEvent> {
        self.deals.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.deals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deals.len()
    }
}
