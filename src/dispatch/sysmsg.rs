//! System-notice category lookup
//!
//! System notices arrive as opaque strings of the form `@<code>\x0b<args>`,
//! where the numeric code is protocol-version specific. The core only needs
//! to recognize the "trade cancelled by opponent" category.

use std::collections::HashMap;

/// Category name of the peer-cancelled mediation notice
pub const TRADE_CANCEL_OPPONENT: &str = "SMT_MEDIATE_TRADE_CANCEL_OPPONENT";

/// Field separator between the code and its arguments
const FIELD_SEPARATOR: char = '\x0b';

/// Protocol-version-scoped map from raw notice code to symbolic category
#[derive(Debug, Default)]
pub struct SysmsgTable {
    maps: HashMap<u32, HashMap<u32, String>>,
}

impl SysmsgTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the mediation codes of the known client builds.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (version, code) in [(321u32, 903u32), (324, 909), (328, 917)] {
            table.insert(version, code, TRADE_CANCEL_OPPONENT);
        }
        table
    }

    /// Register a code for a protocol version.
    pub fn insert(&mut self, protocol_version: u32, code: u32, category: impl Into<String>) {
        self.maps
            .entry(protocol_version)
            .or_default()
            .insert(code, category.into());
    }

    /// Resolve a raw code under the given protocol version.
    pub fn category(&self, protocol_version: u32, code: u32) -> Option<&str> {
        self.maps
            .get(&protocol_version)
            .and_then(|codes| codes.get(&code))
            .map(String::as_str)
    }

    /// Resolve a full notice string (`@<code>\x0b...`) to its category.
    pub fn category_of_notice(&self, protocol_version: u32, message: &str) -> Option<&str> {
        let code = parse_notice_code(message)?;
        self.category(protocol_version, code)
    }
}

/// Extract the numeric code from a notice string, if it carries one.
pub fn parse_notice_code(message: &str) -> Option<u32> {
    let head = message.split(FIELD_SEPARATOR).next()?;
    let code = head.strip_prefix('@')?;
    code.parse().ok()
}
