use crate::market_data::Asset;
use crate::utils::Fixed;

/// Adapter to one external hedging venue
///
/// Deltas are in underlying units: positive buys exposure, negative sells it.
/// The pool is the only caller of the mutating operations; `update` may also
/// be driven by a keeper.
pub trait HedgingReactor: Send + Sync {
    /// Stable identifier used by the dispatcher registry
    fn name(&self) -> &str;

    /// Try to add `delta` of exposure; returns the delta actually realized.
    /// A partial fill is not an error.
    fn hedge_delta(&mut self, delta: Fixed) -> crate::Result<Fixed>;

    /// Delta currently held at the venue
    fn delta(&self) -> Fixed;

    /// Everything the reactor holds, valued in the pool's collateral asset
    fn pool_denominated_value(&self) -> crate::Result<Fixed>;

    /// Return up to `amount` of `asset` to the pool, unwinding exposure if
    /// needed. Returns the amount released.
    fn withdraw(&mut self, amount: Fixed, asset: &Asset) -> crate::Result<Fixed>;

    /// Take `amount` of `asset` from the pool as hedging collateral
    fn fund(&mut self, amount: Fixed, asset: &Asset) -> crate::Result<()>;

    /// Re-sync collateral with the venue without changing exposure.
    /// Returns the signed collateral moved into the venue.
    fn update(&mut self) -> crate::Result<Fixed>;
}

/// Spot exchange the swap reactor trades on
pub trait SwapVenue: Send + Sync {
    /// Underlying price in collateral units
    fn price(&self) -> crate::Result<Fixed>;

    /// Buy exactly `amount` underlying spending at most `max_spend`;
    /// returns the collateral spent
    fn buy_underlying(&self, amount: Fixed, max_spend: Fixed) -> crate::Result<Fixed>;

    /// Sell exactly `amount` underlying; returns the collateral received
    fn sell_underlying(&self, amount: Fixed) -> crate::Result<Fixed>;
}

/// Perpetual-futures venue the perp reactor trades on
pub trait PerpVenue: Send + Sync {
    fn mark_price(&self) -> crate::Result<Fixed>;

    /// Change the signed position by `size`; returns the size filled
    fn trade(&self, size: Fixed) -> crate::Result<Fixed>;

    fn deposit_margin(&self, amount: Fixed) -> crate::Result<()>;

    fn withdraw_margin(&self, amount: Fixed) -> crate::Result<()>;

    /// Account equity held as margin (includes unrealised PnL)
    fn margin(&self) -> crate::Result<Fixed>;
}
