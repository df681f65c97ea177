//! Core types used throughout bargain

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the counterparty making an offer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId(pub u32);

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a broker listing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingId(pub u32);

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite key identifying one negotiation slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DealKey {
    pub party: PartyId,
    pub listing: ListingId,
}

impl DealKey {
    pub fn new(party: PartyId, listing: ListingId) -> Self {
        Self { party, listing }
    }
}

impl fmt::Display for DealKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.party, self.listing)
    }
}

/// One counter-offer from a counterparty on an outstanding listing
///
/// Prices are integer copper amounts. Immutable once received; the engine
/// snapshots the offered price here and never re-reads it during the
/// handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEvent {
    pub party: PartyId,
    pub listing: ListingId,
    pub offered_price: u64,
    pub asking_price: u64,
    pub name: String,
}

impl OfferEvent {
    /// Key identifying this offer's negotiation slot
    pub fn key(&self) -> DealKey {
        DealKey::new(self.party, self.listing)
    }
}
