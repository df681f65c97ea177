//! Price-threshold decision policy

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Verdict of the decision policy for one offer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    /// Offer meets the accept threshold; negotiate it
    Accept,
    /// Offer is below the reject threshold; decline it
    Reject,
    /// Neither threshold applies; leave it to the user
    Undecided,
}

/// Accept / reject threshold ratios
///
/// A zero ratio disables that side of the policy. The accept check runs
/// first; keeping `accept >= reject` is the caller's responsibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Accept offers at or above `asking * accept` (0 disables)
    pub accept: Decimal,
    /// Reject offers below `asking * reject` (0 disables)
    pub reject: Decimal,
}

impl Thresholds {
    pub fn new(accept: Decimal, reject: Decimal) -> Self {
        Self { accept, reject }
    }
}

/// Decide what to do with an offered price against an asking price.
///
/// All arithmetic is exact decimal over the integer copper amounts, so
/// large currency values never lose precision to floating point.
pub fn decide(offered: u64, asking: u64, thresholds: &Thresholds) -> Verdict {
    let offered = Decimal::from(offered);
    let asking = Decimal::from(asking);

    if !thresholds.accept.is_zero() && offered >= asking * thresholds.accept {
        return Verdict::Accept;
    }
    if !thresholds.reject.is_zero() && offered < asking * thresholds.reject {
        return Verdict::Reject;
    }
    Verdict::Undecided
}
