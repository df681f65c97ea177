//! Negotiation engine: the state machine for one side of the bargaining
//! protocol
//!
//! The engine is fully synchronous. Every handler returns the side effects
//! the transition requests (outgoing messages, status strings, timer
//! arming); the app's event loop executes them. Timer fires come back in
//! through [`NegotiationEngine::handle_timer`], serialized with the
//! protocol events, so no transition ever races another.

use std::time::Duration;

use crate::config::BargainConfig;
use crate::dispatch::sysmsg::TRADE_CANCEL_OPPONENT;
use crate::dispatch::{ContractType, Inbound, Outbound, SysmsgTable};
use crate::format::format_price;
use crate::policy::{decide, Verdict};
use crate::queue::PendingDeals;
use crate::recent::RecentDeals;
use crate::timer::TimerKind;
use crate::types::{DealKey, ListingId, OfferEvent, PartyId};

use super::session::{ContractRecord, PendingConfirm, Session, SessionState};

/// Side effect requested by a transition
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Send an outgoing protocol message
    Send(Outbound),
    /// Emit a human-readable status line
    Notify(String),
    /// Arm a single-shot timer, superseding a pending one of the same kind
    ArmTimer(TimerKind, Duration),
    /// Cancel a pending timer (no-op if none)
    CancelTimer(TimerKind),
}

/// The negotiation core: decision policy, pending queue, and the single
/// active session
pub struct NegotiationEngine {
    config: BargainConfig,
    sysmsg: SysmsgTable,
    pending: PendingDeals,
    session: Option<Session>,
    recent: Option<RecentDeals>,
    activation_pending: bool,
}

impl NegotiationEngine {
    pub fn new(config: BargainConfig, sysmsg: SysmsgTable) -> Self {
        let recent = config
            .unattended_manual
            .then(|| RecentDeals::new(config.recent_deal_ttl()));
        Self {
            config,
            sysmsg,
            pending: PendingDeals::new(),
            session: None,
            recent,
            activation_pending: false,
        }
    }

    /// Current protocol stage, for observability and tests.
    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, Session::state)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn pending(&self) -> &PendingDeals {
        &self.pending
    }

    /// Process one decoded protocol event.
    pub fn handle_inbound(&mut self, event: Inbound) -> Vec<Effect> {
        let mut fx = Vec::new();
        match event {
            Inbound::OfferSuggested(offer) => self.on_offer(offer, &mut fx),
            Inbound::RequestDealResult { ok } => self.on_request_deal_result(ok, &mut fx),
            Inbound::DealInfoUpdate {
                party,
                listing,
                buyer_stage,
                seller_stage,
                price,
            } => self.on_deal_info_update(party, listing, buyer_stage, seller_stage, price, &mut fx),
            Inbound::ContractOpened { contract_type, id } => {
                self.on_contract_opened(contract_type, id, &mut fx)
            }
            Inbound::ContractReply { contract_type }
            | Inbound::ContractAccepted { contract_type } => {
                self.on_contract_progress(contract_type, &mut fx)
            }
            Inbound::ContractRejected { contract_type } => {
                self.on_contract_rejected(contract_type, &mut fx)
            }
            Inbound::ContractCancelled { contract_type } => {
                self.on_contract_cancelled(contract_type, &mut fx)
            }
            Inbound::SystemNotice { message } => self.on_system_notice(&message, &mut fx),
            Inbound::ManualContractRequest { party, listing } => {
                self.on_manual_request(DealKey::new(party, listing), &mut fx)
            }
        }
        fx
    }

    /// Process a timer fire.
    pub fn handle_timer(&mut self, kind: TimerKind) -> Vec<Effect> {
        let mut fx = Vec::new();
        match kind {
            TimerKind::Activation => self.activate_next(&mut fx),
            TimerKind::SessionTimeout => self.end_or_retry(&mut fx),
            TimerKind::Confirm => self.on_confirm_due(&mut fx),
        }
        fx
    }

    // A counterparty suggested a deal on one of our listings.
    fn on_offer(&mut self, offer: OfferEvent, fx: &mut Vec<Effect>) {
        // A newer event for the same key supersedes any pending entry.
        self.pending.remove(&offer.key());

        let verdict = decide(
            offer.offered_price,
            offer.asking_price,
            &self.config.thresholds(),
        );
        tracing::debug!(key = %offer.key(), ?verdict, "offer suggested");

        match verdict {
            Verdict::Accept => {
                if self.session.is_none() {
                    self.start_session(offer, fx);
                } else {
                    self.pending.enqueue_or_replace(offer);
                    self.maybe_arm_activation(true, fx);
                }
            }
            Verdict::Reject => {
                fx.push(Effect::Send(Outbound::RejectSuggestedDeal {
                    party: offer.party,
                    listing: offer.listing,
                }));
                // A rejected re-offer on the active slot abandons that slot.
                if self.session.as_ref().map(Session::key) == Some(offer.key()) {
                    self.abandon_session(fx);
                }
            }
            Verdict::Undecided => {
                if let Some(recent) = &mut self.recent {
                    recent.insert(offer.clone());
                }
                self.pending.enqueue_or_replace(offer);
                self.maybe_arm_activation(true, fx);
            }
        }
    }

    // Activation pacing elapsed: take the next deal off the queue.
    fn activate_next(&mut self, fx: &mut Vec<Effect>) {
        self.activation_pending = false;

        // A live session always wins; queued deals wait for it to end.
        if self.session.is_some() {
            return;
        }

        let Some(deal) = self.pending.pop_front() else {
            return;
        };

        // Re-run the policy on the queued snapshot; its prices may be stale.
        let verdict = decide(
            deal.offered_price,
            deal.asking_price,
            &self.config.thresholds(),
        );
        if verdict == Verdict::Accept {
            self.start_session(deal, fx);
            self.set_end_timeout(fx);
        } else {
            fx.push(Effect::Send(Outbound::RejectSuggestedDeal {
                party: deal.party,
                listing: deal.listing,
            }));
            fx.push(Effect::Notify(format!(
                "Declined negotiation from {}.",
                deal.name
            )));
            fx.push(Effect::Notify(price_line(&deal)));
            self.maybe_arm_activation(false, fx);
        }
    }

    // The buyer's handshake stage moved ahead of ours.
    fn on_deal_info_update(
        &mut self,
        party: PartyId,
        listing: ListingId,
        buyer_stage: u32,
        seller_stage: u32,
        price: u64,
        fx: &mut Vec<Effect>,
    ) {
        let Some(session) = &mut self.session else {
            return;
        };
        if buyer_stage == 2 && seller_stage < 2 {
            session.set_pending_confirm(PendingConfirm {
                key: DealKey::new(party, listing),
                price,
                seller_stage,
            });
            // Pace only the very first stage transition.
            let delay = if seller_stage == 0 {
                self.config.pacing.short_delay()
            } else {
                Duration::ZERO
            };
            fx.push(Effect::ArmTimer(TimerKind::Confirm, delay));
        }
    }

    // The paced confirmation is due. Validate the snapshot against the
    // live session before advancing our stage.
    fn on_confirm_due(&mut self, fx: &mut Vec<Effect>) {
        let Some(session) = &mut self.session else {
            return;
        };
        let Some(confirm) = session.take_pending_confirm() else {
            return;
        };

        let deal = session.deal();
        if confirm.key == deal.key() && confirm.price >= deal.offered_price {
            fx.push(Effect::Send(Outbound::ConfirmDealStage {
                listing: deal.listing,
                stage: confirm.seller_stage + 1,
            }));
        } else {
            // Wrong deal, or the price moved against us: abandon.
            tracing::warn!(key = %confirm.key, "handshake no longer matches active deal");
            self.end_or_retry(fx);
        }
    }

    // The counterparty's handshake request opened a contract.
    fn on_contract_opened(&mut self, raw_type: u32, id: u64, fx: &mut Vec<Effect>) {
        let Some(session) = &mut self.session else {
            return;
        };
        let Some(contract_type) = ContractType::from_raw(raw_type) else {
            return;
        };
        session.open_contract(ContractRecord { contract_type, id });
        self.set_end_timeout(fx);
    }

    // Reply/accept on the pending-negotiation dialog counts as forward
    // progress only.
    fn on_contract_progress(&mut self, raw_type: u32, fx: &mut Vec<Effect>) {
        if self.session.is_some() && raw_type == ContractType::PENDING_RAW {
            self.set_end_timeout(fx);
        }
    }

    // Peer rejected the contract.
    fn on_contract_rejected(&mut self, raw_type: u32, fx: &mut Vec<Effect>) {
        let Some(session) = &mut self.session else {
            return;
        };
        let Some(contract_type) = ContractType::from_raw(raw_type) else {
            return;
        };

        fx.push(Effect::Notify(format!(
            "{} aborted negotiation.",
            session.deal().name
        )));

        // An abort of the initial dialog leaves the listing non-negotiable
        // server-side unless we reject the suggestion explicitly.
        if contract_type == ContractType::PendingNegotiation {
            fx.push(Effect::Send(Outbound::RejectSuggestedDeal {
                party: session.deal().party,
                listing: session.deal().listing,
            }));
        }

        session.clear_contract();
        self.end_or_retry(fx);
    }

    // Peer cancelled the contract.
    fn on_contract_cancelled(&mut self, raw_type: u32, fx: &mut Vec<Effect>) {
        let Some(session) = &mut self.session else {
            return;
        };
        if ContractType::from_raw(raw_type).is_none() {
            return;
        }
        session.clear_contract();
        self.end_or_retry(fx);
    }

    // Informational notice only; the protocol cancel event that follows
    // drives the actual transition.
    fn on_system_notice(&mut self, message: &str, fx: &mut Vec<Effect>) {
        let Some(session) = &self.session else {
            return;
        };
        let category = self
            .sysmsg
            .category_of_notice(self.config.protocol_version, message);
        if category == Some(TRADE_CANCEL_OPPONENT) {
            fx.push(Effect::Notify(format!(
                "{} cancelled negotiation.",
                session.deal().name
            )));
        }
    }

    // Server refused our contract request or stage confirmation.
    fn on_request_deal_result(&mut self, ok: bool, fx: &mut Vec<Effect>) {
        if self.session.is_some() && !ok {
            self.end_or_retry(fx);
        }
    }

    // Manual path: the user accepted a cached undecided offer themselves.
    fn on_manual_request(&mut self, key: DealKey, fx: &mut Vec<Effect>) {
        let Some(recent) = &mut self.recent else {
            return;
        };
        if self.session.is_some() {
            return;
        }
        if let Some(deal) = recent.take(&key) {
            self.disarm_activation(fx);
            fx.push(Effect::Notify(format!(
                "Handling negotiation with {}...",
                deal.name
            )));
            tracing::info!(key = %key, "manual negotiation adopted");
            self.session = Some(Session::new(deal));
        }
    }

    /// Adopt `deal` as the active negotiation and request the contract.
    fn start_session(&mut self, deal: OfferEvent, fx: &mut Vec<Effect>) {
        self.disarm_activation(fx);
        fx.push(Effect::Notify(format!(
            "Attempting to negotiate with {}...",
            deal.name
        )));
        fx.push(Effect::Notify(price_line(&deal)));
        fx.push(Effect::Send(Outbound::RequestContract {
            party: deal.party,
            listing: deal.listing,
        }));
        tracing::info!(key = %deal.key(), offered = deal.offered_price, "negotiation started");
        self.session = Some(Session::new(deal));
    }

    /// Timeout recovery and session end.
    ///
    /// With a contract open this is a controlled retry: cancel the contract
    /// and re-arm the timeout so the peer's acknowledgment has time to
    /// arrive. Without one, the session terminates and the queue drains.
    fn end_or_retry(&mut self, fx: &mut Vec<Effect>) {
        if let Some(session) = &mut self.session {
            if let Some(contract) = session.clear_contract() {
                fx.push(Effect::Notify("Negotiation timed out.".to_string()));
                fx.push(Effect::Send(Outbound::CancelContract {
                    contract_type: contract.contract_type,
                    id: contract.id,
                }));
                self.set_end_timeout(fx);
                return;
            }
        }
        self.terminate_session(fx);
    }

    /// Abandonment without the timeout status: cancel any open contract and
    /// terminate.
    fn abandon_session(&mut self, fx: &mut Vec<Effect>) {
        if let Some(session) = &mut self.session {
            if let Some(contract) = session.clear_contract() {
                fx.push(Effect::Send(Outbound::CancelContract {
                    contract_type: contract.contract_type,
                    id: contract.id,
                }));
            }
        }
        self.terminate_session(fx);
    }

    fn terminate_session(&mut self, fx: &mut Vec<Effect>) {
        fx.push(Effect::CancelTimer(TimerKind::SessionTimeout));
        fx.push(Effect::CancelTimer(TimerKind::Confirm));
        if let Some(session) = self.session.take() {
            tracing::info!(key = %session.key(), "negotiation ended");
        }
        self.maybe_arm_activation(false, fx);
    }

    /// (Re)arm the stall timer; shorter when deals are queued behind the
    /// active one so the queue does not starve.
    fn set_end_timeout(&mut self, fx: &mut Vec<Effect>) {
        let ms = if self.pending.is_empty() {
            self.config.timeouts.session_idle_ms
        } else {
            self.config.timeouts.session_busy_ms
        };
        fx.push(Effect::CancelTimer(TimerKind::SessionTimeout));
        fx.push(Effect::ArmTimer(
            TimerKind::SessionTimeout,
            Duration::from_millis(ms),
        ));
    }

    /// Cancel any pending activation timer before a session is adopted, so
    /// a stale fire cannot drain the queue underneath the live session.
    fn disarm_activation(&mut self, fx: &mut Vec<Effect>) {
        if self.activation_pending {
            self.activation_pending = false;
            fx.push(Effect::CancelTimer(TimerKind::Activation));
        }
    }

    /// Arm the activation pacing timer unless one is pending or a session
    /// is active.
    fn maybe_arm_activation(&mut self, long: bool, fx: &mut Vec<Effect>) {
        if self.activation_pending || self.session.is_some() {
            return;
        }
        self.activation_pending = true;
        let delay = if long {
            self.config.pacing.long_delay()
        } else {
            self.config.pacing.short_delay()
        };
        fx.push(Effect::ArmTimer(TimerKind::Activation, delay));
    }
}

fn price_line(deal: &OfferEvent) -> String {
    format!(
        "Price: {} - Offered: {}",
        format_price(deal.asking_price),
        format_price(deal.offered_price)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> BargainConfig {
        let mut config = BargainConfig {
            accept_threshold: dec!(1),
            reject_threshold: dec!(0.75),
            ..BargainConfig::default()
        };
        config.pacing.enabled = false;
        config
    }

    fn engine() -> NegotiationEngine {
        NegotiationEngine::new(config(), SysmsgTable::new())
    }

    fn offer(party: u32, listing: u32, offered: u64, asking: u64) -> OfferEvent {
        OfferEvent {
            party: PartyId(party),
            listing: ListingId(listing),
            offered_price: offered,
            asking_price: asking,
            name: format!("party{party}"),
        }
    }

    fn sends(fx: &[Effect]) -> Vec<&Outbound> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::Send(out) => Some(out),
                _ => None,
            })
            .collect()
    }

    fn notifies(fx: &[Effect]) -> Vec<&str> {
        fx.iter()
            .filter_map(|e| match e {
                Effect::Notify(s) => Some(s.as_str()),
                _ => None,
            })
            .collect()
    }

    fn armed(fx: &[Effect], kind: TimerKind) -> Option<Duration> {
        fx.iter().find_map(|e| match e {
            Effect::ArmTimer(k, d) if *k == kind => Some(*d),
            _ => None,
        })
    }

    /// Drive an engine into an active session via an immediate accept.
    fn engine_with_session() -> NegotiationEngine {
        let mut engine = engine();
        let fx = engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 100, 100)));
        assert_eq!(engine.state(), SessionState::AwaitingHandshake);
        assert!(!sends(&fx).is_empty());
        engine
    }

    /// Additionally open the contract.
    fn engine_in_handshake() -> NegotiationEngine {
        let mut engine = engine_with_session();
        engine.handle_inbound(Inbound::ContractOpened {
            contract_type: 35,
            id: 7,
        });
        assert_eq!(engine.state(), SessionState::InHandshake);
        engine
    }

    #[test]
    fn test_accept_starts_session_immediately() {
        let mut engine = engine();
        let fx = engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 100, 100)));

        assert_eq!(
            sends(&fx),
            vec![&Outbound::RequestContract {
                party: PartyId(1),
                listing: ListingId(10),
            }]
        );
        assert!(notifies(&fx)[0].starts_with("Attempting to negotiate with"));
        assert_eq!(engine.state(), SessionState::AwaitingHandshake);
        // Session timeout waits for the contract record
        assert!(armed(&fx, TimerKind::SessionTimeout).is_none());
    }

    #[test]
    fn test_reject_declines_immediately_without_queueing() {
        let mut engine = engine();
        let fx = engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 50, 100)));

        assert_eq!(
            sends(&fx),
            vec![&Outbound::RejectSuggestedDeal {
                party: PartyId(1),
                listing: ListingId(10),
            }]
        );
        assert_eq!(engine.state(), SessionState::Idle);
        assert!(engine.pending().is_empty());
    }

    #[test]
    fn test_undecided_enqueues_and_arms_activation() {
        let mut engine = engine();
        let fx = engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 80, 100)));

        assert!(sends(&fx).is_empty());
        assert!(armed(&fx, TimerKind::Activation).is_some());
        assert_eq!(engine.pending().len(), 1);
    }

    #[test]
    fn test_second_accept_queues_behind_active_session() {
        let mut engine = engine_with_session();
        let fx = engine.handle_inbound(Inbound::OfferSuggested(offer(2, 20, 100, 100)));

        assert!(sends(&fx).is_empty());
        assert_eq!(engine.pending().len(), 1);
        // The active session is never preempted
        assert_eq!(engine.session().unwrap().key().party, PartyId(1));
    }

    #[test]
    fn test_session_start_disarms_pending_activation() {
        let mut engine = engine();
        engine.handle_inbound(Inbound::OfferSuggested(offer(2, 20, 80, 100)));

        let fx = engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 100, 100)));
        assert!(fx.contains(&Effect::CancelTimer(TimerKind::Activation)));
        assert_eq!(engine.session().unwrap().key().party, PartyId(1));
        // The queued deal stays put until the session ends
        assert_eq!(engine.pending().len(), 1);
    }

    #[test]
    fn test_stale_activation_fire_does_not_preempt_session() {
        let mut engine = engine();
        // Undecided offer arms the activation timer, then an accept adopts a
        // session and a re-offer upgrades the queued entry to accept-verdict
        engine.handle_inbound(Inbound::OfferSuggested(offer(2, 20, 80, 100)));
        engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 100, 100)));
        engine.handle_inbound(Inbound::OfferSuggested(offer(2, 20, 100, 100)));
        engine.handle_inbound(Inbound::ContractOpened {
            contract_type: 35,
            id: 7,
        });

        // A fire that slipped past the cancel must leave everything alone
        let fx = engine.handle_timer(TimerKind::Activation);
        assert!(fx.is_empty());
        assert_eq!(engine.session().unwrap().key().party, PartyId(1));
        assert_eq!(engine.state(), SessionState::InHandshake);
        assert_eq!(engine.pending().len(), 1);
    }

    #[test]
    fn test_manual_adoption_disarms_pending_activation() {
        let mut config = config();
        config.unattended_manual = true;
        let mut engine = NegotiationEngine::new(config, SysmsgTable::new());

        engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 80, 100)));
        let fx = engine.handle_inbound(Inbound::ManualContractRequest {
            party: PartyId(1),
            listing: ListingId(10),
        });

        assert!(fx.contains(&Effect::CancelTimer(TimerKind::Activation)));
        let fx = engine.handle_timer(TimerKind::Activation);
        assert!(fx.is_empty());
        assert_eq!(engine.state(), SessionState::AwaitingHandshake);
    }

    #[test]
    fn test_activation_redecides_and_declines_undecided() {
        // End-to-end scenario 1: 0.8 of asking sits between the thresholds,
        // so activation treats it as a decline.
        let mut engine = engine();
        engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 80, 100)));

        let fx = engine.handle_timer(TimerKind::Activation);
        assert_eq!(
            sends(&fx),
            vec![&Outbound::RejectSuggestedDeal {
                party: PartyId(1),
                listing: ListingId(10),
            }]
        );
        assert!(notifies(&fx).contains(&"Declined negotiation from party1."));
        // Chained activation is re-armed to drain the queue
        assert!(armed(&fx, TimerKind::Activation).is_some());

        let fx = engine.handle_timer(TimerKind::Activation);
        assert!(fx.is_empty());
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_activation_accepts_and_arms_timeout() {
        let mut engine = engine();
        // Accept-verdict offer forced into the queue behind an active session
        engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 100, 100)));
        engine.handle_inbound(Inbound::OfferSuggested(offer(2, 20, 100, 100)));

        // First session ends with nothing open
        engine.handle_timer(TimerKind::SessionTimeout);
        assert_eq!(engine.state(), SessionState::Idle);

        let fx = engine.handle_timer(TimerKind::Activation);
        assert_eq!(
            sends(&fx),
            vec![&Outbound::RequestContract {
                party: PartyId(2),
                listing: ListingId(20),
            }]
        );
        assert!(armed(&fx, TimerKind::SessionTimeout).is_some());
        assert_eq!(engine.state(), SessionState::AwaitingHandshake);
    }

    #[test]
    fn test_contract_opened_arms_idle_timeout() {
        let mut engine = engine_with_session();
        let fx = engine.handle_inbound(Inbound::ContractOpened {
            contract_type: 35,
            id: 7,
        });

        assert_eq!(engine.state(), SessionState::InHandshake);
        assert_eq!(
            armed(&fx, TimerKind::SessionTimeout),
            Some(Duration::from_millis(30_000))
        );
    }

    #[test]
    fn test_contract_opened_busy_timeout_when_queued() {
        let mut engine = engine_with_session();
        engine.handle_inbound(Inbound::OfferSuggested(offer(2, 20, 80, 100)));

        let fx = engine.handle_inbound(Inbound::ContractOpened {
            contract_type: 35,
            id: 7,
        });
        assert_eq!(
            armed(&fx, TimerKind::SessionTimeout),
            Some(Duration::from_millis(15_000))
        );
    }

    #[test]
    fn test_non_negotiation_contract_ignored() {
        let mut engine = engine_with_session();
        let fx = engine.handle_inbound(Inbound::ContractOpened {
            contract_type: 12,
            id: 7,
        });
        assert!(fx.is_empty());
        assert_eq!(engine.state(), SessionState::AwaitingHandshake);
    }

    #[test]
    fn test_contract_reply_rearms_timeout() {
        let mut engine = engine_in_handshake();
        let fx = engine.handle_inbound(Inbound::ContractReply { contract_type: 35 });
        assert!(armed(&fx, TimerKind::SessionTimeout).is_some());

        // Type 36 replies are not the pending dialog; no re-arm
        let fx = engine.handle_inbound(Inbound::ContractAccepted { contract_type: 36 });
        assert!(armed(&fx, TimerKind::SessionTimeout).is_none());
    }

    #[test]
    fn test_handshake_confirm_advances_stage() {
        // End-to-end scenario 3: peer stage advanced, price still matches.
        let mut engine = engine_in_handshake();
        let fx = engine.handle_inbound(Inbound::DealInfoUpdate {
            party: PartyId(1),
            listing: ListingId(10),
            buyer_stage: 2,
            seller_stage: 0,
            price: 100,
        });
        assert!(armed(&fx, TimerKind::Confirm).is_some());
        assert!(sends(&fx).is_empty());

        let fx = engine.handle_timer(TimerKind::Confirm);
        assert_eq!(
            sends(&fx),
            vec![&Outbound::ConfirmDealStage {
                listing: ListingId(10),
                stage: 1,
            }]
        );
    }

    #[test]
    fn test_handshake_price_drop_abandons() {
        let mut engine = engine_in_handshake();
        engine.handle_inbound(Inbound::DealInfoUpdate {
            party: PartyId(1),
            listing: ListingId(10),
            buyer_stage: 2,
            seller_stage: 0,
            price: 99, // below the recorded offered price
        });

        let fx = engine.handle_timer(TimerKind::Confirm);
        let outbound = sends(&fx);
        assert!(matches!(outbound[0], Outbound::CancelContract { .. }));
        // Contract cleared, session retained for the cancel acknowledgment
        assert_eq!(engine.state(), SessionState::AwaitingHandshake);
    }

    #[test]
    fn test_handshake_wrong_key_abandons() {
        let mut engine = engine_in_handshake();
        engine.handle_inbound(Inbound::DealInfoUpdate {
            party: PartyId(9),
            listing: ListingId(90),
            buyer_stage: 2,
            seller_stage: 0,
            price: 200,
        });

        let fx = engine.handle_timer(TimerKind::Confirm);
        assert!(matches!(sends(&fx)[0], Outbound::CancelContract { .. }));
    }

    #[test]
    fn test_timeout_with_contract_cancels_once_and_rearms() {
        // End-to-end scenario 4: a stalled handshake sends exactly one
        // cancel and stays in session.
        let mut engine = engine_in_handshake();
        let fx = engine.handle_timer(TimerKind::SessionTimeout);

        let outbound = sends(&fx);
        assert_eq!(outbound.len(), 1);
        assert_eq!(
            outbound[0],
            &Outbound::CancelContract {
                contract_type: ContractType::PendingNegotiation,
                id: 7,
            }
        );
        assert!(notifies(&fx).contains(&"Negotiation timed out."));
        assert!(armed(&fx, TimerKind::SessionTimeout).is_some());
        assert!(engine.session().is_some());
    }

    #[test]
    fn test_timeout_without_contract_ends_session() {
        let mut engine = engine_with_session();
        let fx = engine.handle_timer(TimerKind::SessionTimeout);

        assert!(sends(&fx).is_empty());
        assert_eq!(engine.state(), SessionState::Idle);
        assert!(armed(&fx, TimerKind::Activation).is_some());
    }

    #[test]
    fn test_second_timeout_after_cancel_terminates() {
        let mut engine = engine_in_handshake();
        engine.handle_timer(TimerKind::SessionTimeout);
        let fx = engine.handle_timer(TimerKind::SessionTimeout);

        assert!(sends(&fx).is_empty());
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_peer_reject_of_pending_dialog_unsticks_listing() {
        let mut engine = engine_in_handshake();
        let fx = engine.handle_inbound(Inbound::ContractRejected { contract_type: 35 });

        assert!(notifies(&fx).contains(&"party1 aborted negotiation."));
        assert!(sends(&fx).contains(&&Outbound::RejectSuggestedDeal {
            party: PartyId(1),
            listing: ListingId(10),
        }));
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_peer_reject_in_negotiation_no_extra_reject() {
        let mut engine = engine_with_session();
        engine.handle_inbound(Inbound::ContractOpened {
            contract_type: 36,
            id: 8,
        });
        let fx = engine.handle_inbound(Inbound::ContractRejected { contract_type: 36 });

        assert!(sends(&fx).is_empty());
        assert!(notifies(&fx).contains(&"party1 aborted negotiation."));
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_peer_cancel_ends_quietly() {
        let mut engine = engine_in_handshake();
        let fx = engine.handle_inbound(Inbound::ContractCancelled { contract_type: 35 });

        assert!(sends(&fx).is_empty());
        assert!(notifies(&fx).is_empty());
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_server_refusal_ends_session() {
        let mut engine = engine_with_session();
        let fx = engine.handle_inbound(Inbound::RequestDealResult { ok: false });
        assert_eq!(engine.state(), SessionState::Idle);
        assert!(armed(&fx, TimerKind::Activation).is_some());

        // ok: true is not a transition
        let mut engine = engine_with_session();
        let fx = engine.handle_inbound(Inbound::RequestDealResult { ok: true });
        assert!(fx.is_empty());
        assert_eq!(engine.state(), SessionState::AwaitingHandshake);
    }

    #[test]
    fn test_system_notice_cancel_by_opponent() {
        let mut config = config();
        config.protocol_version = 321;
        let mut sysmsg = SysmsgTable::new();
        sysmsg.insert(321, 903, TRADE_CANCEL_OPPONENT);
        let mut engine = NegotiationEngine::new(config, sysmsg);

        engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 100, 100)));
        let fx = engine.handle_inbound(Inbound::SystemNotice {
            message: "@903\x0bparty1".to_string(),
        });

        assert!(notifies(&fx).contains(&"party1 cancelled negotiation."));
        // Informational only: the session is untouched
        assert_eq!(engine.state(), SessionState::AwaitingHandshake);

        let fx = engine.handle_inbound(Inbound::SystemNotice {
            message: "@904\x0bparty1".to_string(),
        });
        assert!(fx.is_empty());
    }

    #[test]
    fn test_reject_of_active_key_abandons_slot() {
        let mut engine = engine_in_handshake();
        // A re-offer on the active slot that now fails the policy
        let fx = engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 10, 100)));

        let outbound = sends(&fx);
        assert_eq!(
            outbound[0],
            &Outbound::RejectSuggestedDeal {
                party: PartyId(1),
                listing: ListingId(10),
            }
        );
        assert!(matches!(outbound[1], Outbound::CancelContract { .. }));
        assert_eq!(engine.state(), SessionState::Idle);
        assert!(armed(&fx, TimerKind::Activation).is_some());
    }

    #[test]
    fn test_same_key_offer_does_not_interrupt_handshake() {
        let mut engine = engine_in_handshake();
        let fx = engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 80, 100)));

        // Only a pending entry is replaced; the handshake continues
        assert!(sends(&fx).is_empty());
        assert_eq!(engine.state(), SessionState::InHandshake);
        assert_eq!(engine.pending().len(), 1);
    }

    #[test]
    fn test_queue_dedup_survives_session() {
        let mut engine = engine_with_session();
        engine.handle_inbound(Inbound::OfferSuggested(offer(2, 20, 80, 100)));
        engine.handle_inbound(Inbound::OfferSuggested(offer(3, 30, 80, 100)));
        engine.handle_inbound(Inbound::OfferSuggested(offer(2, 20, 85, 100)));

        assert_eq!(engine.pending().len(), 2);
    }

    #[test]
    fn test_manual_request_adopts_cached_offer() {
        let mut config = config();
        config.unattended_manual = true;
        let mut engine = NegotiationEngine::new(config, SysmsgTable::new());

        engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 80, 100)));
        let fx = engine.handle_inbound(Inbound::ManualContractRequest {
            party: PartyId(1),
            listing: ListingId(10),
        });

        assert!(notifies(&fx).contains(&"Handling negotiation with party1..."));
        assert_eq!(engine.state(), SessionState::AwaitingHandshake);
        // The manual path sends nothing; the user's client already did
        assert!(sends(&fx).is_empty());
    }

    #[test]
    fn test_manual_request_ignored_when_disabled() {
        let mut engine = engine();
        engine.handle_inbound(Inbound::OfferSuggested(offer(1, 10, 80, 100)));
        let fx = engine.handle_inbound(Inbound::ManualContractRequest {
            party: PartyId(1),
            listing: ListingId(10),
        });

        assert!(fx.is_empty());
        assert_eq!(engine.state(), SessionState::Idle);
    }

    #[test]
    fn test_events_without_session_ignored() {
        let mut engine = engine();
        assert!(engine
            .handle_inbound(Inbound::ContractOpened {
                contract_type: 35,
                id: 1,
            })
            .is_empty());
        assert!(engine
            .handle_inbound(Inbound::ContractRejected { contract_type: 35 })
            .is_empty());
        assert!(engine
            .handle_inbound(Inbound::DealInfoUpdate {
                party: PartyId(1),
                listing: ListingId(1),
                buyer_stage: 2,
                seller_stage: 0,
                price: 100,
            })
            .is_empty());
    }
}
