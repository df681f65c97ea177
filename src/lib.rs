//! Automated counter-offer negotiation
//!
//! Automates one side of the broker bargaining protocol: applies a
//! price-threshold policy to incoming offers, serializes them into a single
//! active negotiation, drives the contract handshake, and recovers from
//! stalls via timeouts.
//!
//! The core is [`negotiation::NegotiationEngine`], a synchronous state
//! machine that turns decoded protocol events and timer fires into effects
//! (outgoing messages, status lines, timer requests). The [`cli`] layer
//! wires it to a line-delimited JSON dispatch stream and real timers.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod negotiation;
pub mod notify;
pub mod policy;
pub mod queue;
pub mod recent;
pub mod timer;
pub mod types;

// Re-export commonly used types
pub use config::BargainConfig;
pub use dispatch::{ContractType, Inbound, Outbound, SysmsgTable};
pub use error::{BargainError, Result};
pub use negotiation::{Effect, NegotiationEngine, SessionState};
pub use policy::{decide, Thresholds, Verdict};
pub use types::{DealKey, ListingId, OfferEvent, PartyId};
