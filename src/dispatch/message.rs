//! Inbound and outbound protocol messages
//!
//! Serde-tagged enums carried as newline-delimited JSON over the dispatch
//! stream. Contract events carry the raw numeric contract type; only the
//! negotiation types (35/36) concern the engine.

use serde::{Deserialize, Serialize};

use crate::types::{ListingId, OfferEvent, PartyId};

/// Raw contract type codes for the two negotiation handshake variants
///
/// Carried on the wire as the raw numeric code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum ContractType {
    /// Initial dialog: negotiation suggested but not yet opened (code 35)
    PendingNegotiation,
    /// Negotiation in progress (code 36)
    Negotiation,
}

impl ContractType {
    pub const PENDING_RAW: u32 = 35;
    pub const NEGOTIATION_RAW: u32 = 36;

    /// Map a raw wire code to a negotiation contract type, if it is one.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            Self::PENDING_RAW => Some(Self::PendingNegotiation),
            Self::NEGOTIATION_RAW => Some(Self::Negotiation),
            _ => None,
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::PendingNegotiation => Self::PENDING_RAW,
            Self::Negotiation => Self::NEGOTIATION_RAW,
        }
    }
}

impl From<ContractType> for u32 {
    fn from(value: ContractType) -> Self {
        value.raw()
    }
}

impl TryFrom<u32> for ContractType {
    type Error = String;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::from_raw(raw).ok_or_else(|| format!("not a negotiation contract type: {raw}"))
    }
}

/// Decoded protocol events delivered to the core
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// A counterparty suggested a deal on one of our listings
    OfferSuggested(OfferEvent),
    /// Server verdict on our last broker request
    RequestDealResult { ok: bool },
    /// Handshake stage counters moved
    DealInfoUpdate {
        party: PartyId,
        listing: ListingId,
        buyer_stage: u32,
        seller_stage: u32,
        price: u64,
    },
    /// The counterparty's handshake request opened a contract
    ContractOpened { contract_type: u32, id: u64 },
    /// Server acknowledged a contract request
    ContractReply { contract_type: u32 },
    /// Peer accepted the contract
    ContractAccepted { contract_type: u32 },
    /// Peer rejected the contract
    ContractRejected { contract_type: u32 },
    /// Peer cancelled the contract
    ContractCancelled { contract_type: u32 },
    /// Raw system notice, category resolved via [`super::SysmsgTable`]
    SystemNotice { message: String },
    /// The user manually accepted a suggestion (unattended manual mode)
    ManualContractRequest { party: PartyId, listing: ListingId },
}

/// Protocol messages the core sends back through the dispatch stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Open the negotiation handshake for a suggested deal
    RequestContract { party: PartyId, listing: ListingId },
    /// Advance our side of the handshake to `stage`
    ConfirmDealStage { listing: ListingId, stage: u32 },
    /// Decline a suggested deal
    RejectSuggestedDeal { party: PartyId, listing: ListingId },
    /// Abandon an open contract
    CancelContract { contract_type: ContractType, id: u64 },
}
