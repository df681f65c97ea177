//! Recent-deals cache for the unattended manual mode
//!
//! Remembers offers the policy left undecided so that a single manual
//! accept can hand them to the negotiation engine. Entries expire after a
//! fixed retention window; expiry is enforced on access rather than with
//! per-entry timers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::{DealKey, OfferEvent};

/// TTL cache of the most recent offer per deal key
#[derive(Debug)]
pub struct RecentDeals {
    ttl: Duration,
    entries: HashMap<DealKey, (OfferEvent, Instant)>,
}

impl RecentDeals {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Record `event` as the most recent offer for its key.
    pub fn insert(&mut self, event: OfferEvent) {
        self.insert_at(event, Instant::now());
    }

    /// Return and remove the cached offer for `key`, if it has not expired.
    pub fn take(&mut self, key: &DealKey) -> Option<OfferEvent> {
        self.take_at(key, Instant::now())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert_at(&mut self, event: OfferEvent, now: Instant) {
        self.purge(now);
        self.entries.insert(event.key(), (event, now));
    }

    fn take_at(&mut self, key: &DealKey, now: Instant) -> Option<OfferEvent> {
        self.purge(now);
        self.entries.remove(key).map(|(event, _)| event)
    }

    fn purge(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, (_, inserted)| now.duration_since(*inserted) < ttl);
    }
}
