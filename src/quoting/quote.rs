use crate::market_data::OptionSeries;
use crate::utils::Fixed;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a premium was assembled
///
/// `base` is the vanilla Black-Scholes value of the whole order. `slippage`
/// is the signed adjustment from path-dependent slippage. The remaining
/// components are magnitudes; a buy adds them and a sell subtracts `spread`
/// and `delta_financing` (collateral cost only applies to buys).
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub base: Fixed,
    pub slippage: Fixed,
    pub spread: Fixed,
    pub collateral_cost: Fixed,
    pub delta_financing: Fixed,
}

impl FeeBreakdown {
    /// Premium before the non-negativity clamp
    pub fn unclamped_premium(&self, is_sell: bool) -> Fixed {
        let slipped = self.base + self.slippage;
        if is_sell {
            slipped - self.spread - self.delta_financing
        } else {
            slipped + self.spread + self.collateral_cost + self.delta_financing
        }
    }
}

/// A transactable price for one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub series: OptionSeries,
    pub amount: Fixed,

    /// Direction from the user's side: true when the user sells to the pool
    pub is_sell: bool,

    /// Total premium for the order, never negative
    pub premium: Fixed,

    pub fees: FeeBreakdown,

    /// Per-unit delta times amount
    pub total_delta: Fixed,

    /// Implied volatility used
    pub iv: f64,

    /// Spot used
    pub spot: Fixed,

    pub quoted_at: u64,
}

impl Quote {
    /// Premium per contract
    pub fn unit_premium(&self) -> Fixed {
        self.premium.div(self.amount)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} x{} premium={:.4} (base={:.4} slip={:.4} spread={:.4} collat={:.4} fin={:.4}) delta={:.4} iv={:.4}",
            if self.is_sell { "SELL" } else { "BUY" },
            self.series,
            self.amount,
            self.premium,
            self.fees.base,
            self.fees.slippage,
            self.fees.spread,
            self.fees.collateral_cost,
            self.fees.delta_financing,
            self.total_delta,
            self.iv
        )
    }
}
