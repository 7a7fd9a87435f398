use crate::market_data::{OptionSeries, OptionSide};
use crate::pricing::VolatilitySource;
use crate::risk::{CompressedExposure, PositionLedger};
use crate::utils::Fixed;
use serde::{Deserialize, Serialize};

/// Which exposure representation the engine keeps
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackerMode {
    /// Constant-size weighted aggregate per side (approximate delta)
    #[default]
    Compressed,

    /// Net amount per series (exact delta, O(n) reads)
    Ledger,
}

/// Market inputs needed to re-price open exposure
pub struct DeltaContext<'a> {
    pub spot: Fixed,
    pub now: u64,
    pub risk_free_rate: f64,
    pub volatility: &'a dyn VolatilitySource,
}

/// Running record of the pool's open option exposure
///
/// Amounts are signed from the pool's perspective: positive when the pool is
/// long the option, negative when it has written it.
pub trait RiskTracker: Send + Sync {
    fn mode(&self) -> TrackerMode;

    /// Apply a signed change in the pool's position in `series`
    fn record_trade(&mut self, series: &OptionSeries, amount: Fixed) -> crate::Result<()>;

    /// Exposure the quote path treats as "already filled" for this series
    fn net_exposure(&self, series: &OptionSeries) -> Fixed;

    /// Net amount held across every series of one side
    fn side_exposure(&self, side: OptionSide) -> Fixed;

    /// Portfolio delta of all open option exposure at the current spot
    fn portfolio_delta(&self, ctx: &DeltaContext<'_>) -> crate::Result<Fixed>;

    /// Serializable copy of the tracker's state
    fn snapshot(&self) -> TrackerState;
}

/// Persisted form of either tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrackerState {
    Compressed(CompressedExposure),
    Ledger(PositionLedger),
}

impl TrackerState {
    pub fn empty(mode: TrackerMode) -> Self {
        match mode {
            TrackerMode::Compressed => TrackerState::Compressed(CompressedExposure::new()),
            TrackerMode::Ledger => TrackerState::Ledger(PositionLedger::new()),
        }
    }

    pub fn mode(&self) -> TrackerMode {
        match self {
            TrackerState::Compressed(_) => TrackerMode::Compressed,
            TrackerState::Ledger(_) => TrackerMode::Ledger,
        }
    }

    pub fn into_tracker(self) -> Box<dyn RiskTracker> {
        match self {
            TrackerState::Compressed(tracker) => Box::new(tracker),
            TrackerState::Ledger(tracker) => Box::new(tracker),
        }
    }
}

/// Price one (possibly synthetic) position's delta at the current spot
pub(crate) fn position_delta(
    ctx: &DeltaContext<'_>,
    side: OptionSide,
    strike: Fixed,
    expiration: u64,
    amount: Fixed,
) -> crate::Result<Fixed> {
    let iv = ctx
        .volatility
        .implied_volatility(side, ctx.spot, strike, expiration, ctx.now)?;
    if !iv.is_finite() || iv < 0.0 {
        return Err(crate::Error::ConfigInvalid(format!(
            "volatility surface returned {} for {} strike {}",
            iv, side, strike
        )));
    }

    let time_years = crate::utils::years_until(expiration, ctx.now);
    let priced = crate::pricing::price(
        ctx.spot.to_f64(),
        strike.to_f64(),
        time_years,
        iv,
        ctx.risk_free_rate,
        side.is_put(),
    );

    Fixed::try_from_f64(priced.delta * amount.to_f64())
}
