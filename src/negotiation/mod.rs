//! Negotiation core: decision-driven session state machine

pub mod engine;
pub mod session;

pub use engine::{Effect, NegotiationEngine};
pub use session::{ContractRecord, PendingConfirm, Session, SessionState};
