//! The single active negotiation session

use crate::dispatch::ContractType;
use crate::types::{DealKey, OfferEvent};

/// Protocol stage of the active negotiation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No deal being negotiated
    Idle,
    /// Deal accepted, contract not yet opened
    AwaitingHandshake,
    /// Contract opened, stage exchange in progress
    InHandshake,
}

/// The open contract of a handshake in progress
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractRecord {
    pub contract_type: ContractType,
    pub id: u64,
}

/// A stage confirmation waiting on its pacing delay
///
/// Snapshots the deal key and reported price at the moment the stage update
/// arrived; the confirm fires against this snapshot, never a re-read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingConfirm {
    pub key: DealKey,
    pub price: u64,
    pub seller_stage: u32,
}

/// At most one session is live at any time, owned by the engine
#[derive(Clone, Debug)]
pub struct Session {
    deal: OfferEvent,
    contract: Option<ContractRecord>,
    pending_confirm: Option<PendingConfirm>,
}

impl Session {
    /// Open a session for an accepted deal.
    pub fn new(deal: OfferEvent) -> Self {
        Self {
            deal,
            contract: None,
            pending_confirm: None,
        }
    }

    pub fn deal(&self) -> &OfferEvent {
        &self.deal
    }

    pub fn key(&self) -> DealKey {
        self.deal.key()
    }

    pub fn contract(&self) -> Option<&ContractRecord> {
        self.contract.as_ref()
    }

    /// Attach the contract record once the handshake request arrives.
    pub fn open_contract(&mut self, contract: ContractRecord) {
        self.contract = Some(contract);
    }

    /// Clear the contract on a terminal handshake event, returning it.
    pub fn clear_contract(&mut self) -> Option<ContractRecord> {
        self.contract.take()
    }

    pub fn set_pending_confirm(&mut self, confirm: PendingConfirm) {
        self.pending_confirm = Some(confirm);
    }

    pub fn take_pending_confirm(&mut self) -> Option<PendingConfirm> {
        self.pending_confirm.take()
    }

    pub fn state(&self) -> SessionState {
        if self.contract.is_some() {
            SessionState::InHandshake
        } else {
            SessionState::AwaitingHandshake
        }
    }
}
