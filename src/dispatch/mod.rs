//! Typed protocol boundary
//!
//! The transport decodes raw network bytes elsewhere; this module defines
//! the already-decoded messages the core consumes and produces, plus the
//! system-notice category lookup.

pub mod message;
pub mod sysmsg;

pub use message::{ContractType, Inbound, Outbound};
pub use sysmsg::SysmsgTable;
