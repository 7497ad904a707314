//! System fee applied to the seller's proceeds

use crate::numeric::round_money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fee schedule for settlement
///
/// The seller is credited `notional × (1 − system_fee_rate)`; the buyer pays
/// the full notional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub system_fee_rate: Decimal,
}

impl FeeSchedule {
    /// Create a schedule, returning None unless the rate is in [0, 1]
    pub fn new(system_fee_rate: Decimal) -> Option<Self> {
        (system_fee_rate >= Decimal::ZERO && system_fee_rate <= Decimal::ONE)
            .then_some(Self { system_fee_rate })
    }

    pub fn zero() -> Self {
        Self {
            system_fee_rate: Decimal::ZERO,
        }
    }

    /// Amount credited to the seller for a trade of `notional`
    pub fn seller_credit(&self, notional: Decimal) -> Decimal {
        round_money(notional * (Decimal::ONE - self.system_fee_rate))
    }

    /// Fee retained by the system: `notional - seller_credit`
    pub fn fee(&self, notional: Decimal) -> Decimal {
        notional - self.seller_credit(notional)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::zero()
    }
}
