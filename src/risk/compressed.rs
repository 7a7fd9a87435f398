use crate::market_data::{OptionSeries, OptionSide};
use crate::risk::tracker::position_delta;
use crate::risk::{DeltaContext, RiskTracker, TrackerMode, TrackerState};
use crate::utils::Fixed;
use log::debug;
use serde::{Deserialize, Serialize};

/// Weighted summary of every open position on one side
///
/// The time coordinate is kept as an absolute expiration so the centroid
/// does not need re-weighting as the clock moves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortfolioAggregate {
    /// Signed net amount (positive = pool long)
    pub total_amount: Fixed,

    /// Amount-weighted strike
    pub weighted_strike: Fixed,

    /// Amount-weighted expiration (unix seconds)
    pub weighted_expiration: u64,
}

impl PortfolioAggregate {
    pub fn is_empty(&self) -> bool {
        self.total_amount.is_zero()
    }
}

/// O(1) exposure tracker: one blended aggregate per side
///
/// Adding to a position blends the new strike and expiry into the centroid
/// with weight `|amount| / (|total| + |amount|)`. Reducing a position leaves
/// the centroid untouched; it resets to zero when the total reaches zero and
/// restarts at the trade's own values when the total changes sign.
///
/// ```text
/// write 1 @ 2400  -> total -1, strike 2400
/// write 1 @ 2600  -> total -2, strike 2500
/// buy back 1      -> total -1, strike 2500   (centroid kept)
/// buy back 1      -> total  0, strike 0      (reset)
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompressedExposure {
    aggregates: [PortfolioAggregate; 2],
}

impl CompressedExposure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregate(&self, side: OptionSide) -> &PortfolioAggregate {
        &self.aggregates[side.index()]
    }

    /// Blend a signed trade into one side's aggregate
    pub fn record(
        &mut self,
        side: OptionSide,
        amount: Fixed,
        strike: Fixed,
        expiration: u64,
    ) -> crate::Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let aggregate = &mut self.aggregates[side.index()];
        let old_total = aggregate.total_amount;
        let new_total = old_total.checked_add(amount).ok_or_else(|| {
            crate::Error::Calculation(format!("{} exposure overflow", side))
        })?;

        if old_total.is_zero() || old_total.signum() == amount.signum() {
            let old_weight = old_total.abs().raw() as i128;
            let new_weight = amount.abs().raw() as i128;
            let denominator = old_weight + new_weight;

            let strike_raw = (aggregate.weighted_strike.raw() as i128 * old_weight
                + strike.raw() as i128 * new_weight)
                / denominator;
            let expiration_wide = (aggregate.weighted_expiration as i128 * old_weight
                + expiration as i128 * new_weight)
                / denominator;

            aggregate.weighted_strike = Fixed::from_raw(strike_raw as i64);
            aggregate.weighted_expiration = expiration_wide as u64;
            aggregate.total_amount = new_total;
        } else if new_total.is_zero() {
            *aggregate = PortfolioAggregate::default();
        } else if new_total.signum() == old_total.signum() {
            aggregate.total_amount = new_total;
        } else {
            // Crossed through zero: the residual is a fresh position
            aggregate.total_amount = new_total;
            aggregate.weighted_strike = strike;
            aggregate.weighted_expiration = expiration;
        }

        debug!(
            "{} aggregate: total={} strike={} expiry={}",
            side, aggregate.total_amount, aggregate.weighted_strike, aggregate.weighted_expiration
        );
        Ok(())
    }
}

impl RiskTracker for CompressedExposure {
    fn mode(&self) -> TrackerMode {
        TrackerMode::Compressed
    }

    fn record_trade(&mut self, series: &OptionSeries, amount: Fixed) -> crate::Result<()> {
        self.record(series.side(), amount, series.strike, series.expiration)
    }

    fn net_exposure(&self, series: &OptionSeries) -> Fixed {
        self.aggregate(series.side()).total_amount
    }

    fn side_exposure(&self, side: OptionSide) -> Fixed {
        self.aggregate(side).total_amount
    }

    fn portfolio_delta(&self, ctx: &DeltaContext<'_>) -> crate::Result<Fixed> {
        let mut delta = Fixed::ZERO;
        for side in [OptionSide::Call, OptionSide::Put] {
            let aggregate = self.aggregate(side);
            if aggregate.is_empty() {
                continue;
            }
            delta += position_delta(
                ctx,
                side,
                aggregate.weighted_strike,
                aggregate.weighted_expiration,
                aggregate.total_amount,
            )?;
        }
        Ok(delta)
    }

    fn snapshot(&self) -> TrackerState {
        TrackerState::Compressed(self.clone())
    }
}
