use crate::hedging::{HedgingReactor, SwapVenue};
use crate::market_data::Asset;
use crate::utils::Fixed;
use log::{debug, warn};
use std::sync::Arc;

/// Hedges by holding the underlying itself, bought on a spot venue
///
/// Can only be long: selling stops at the underlying it holds, buying stops
/// at the collateral it holds.
pub struct SpotSwapReactor {
    name: String,
    venue: Arc<dyn SwapVenue>,
    collateral_asset: Asset,
    underlying_balance: Fixed,
    collateral_balance: Fixed,
}

impl SpotSwapReactor {
    pub fn new(name: impl Into<String>, venue: Arc<dyn SwapVenue>, collateral_asset: Asset) -> Self {
        Self {
            name: name.into(),
            venue,
            collateral_asset,
            underlying_balance: Fixed::ZERO,
            collateral_balance: Fixed::ZERO,
        }
    }

    /// Fund the reactor with collateral
    pub fn deposit(&mut self, amount: Fixed) {
        self.collateral_balance += amount.floor_zero();
    }

    pub fn collateral_balance(&self) -> Fixed {
        self.collateral_balance
    }

    fn buy(&mut self, wanted: Fixed) -> crate::Result<Fixed> {
        let price = self.venue.price()?;
        let affordable = self.collateral_balance.div(price);
        let amount = wanted.min(affordable);
        if !amount.is_positive() {
            return Ok(Fixed::ZERO);
        }

        let spent = self.venue.buy_underlying(amount, self.collateral_balance)?;
        self.collateral_balance -= spent;
        self.underlying_balance += amount;
        Ok(amount)
    }

    fn sell(&mut self, wanted: Fixed) -> crate::Result<Fixed> {
        let amount = wanted.min(self.underlying_balance);
        if !amount.is_positive() {
            return Ok(Fixed::ZERO);
        }

        let received = self.venue.sell_underlying(amount)?;
        self.collateral_balance += received;
        self.underlying_balance -= amount;
        Ok(amount)
    }
}

impl HedgingReactor for SpotSwapReactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn hedge_delta(&mut self, delta: Fixed) -> crate::Result<Fixed> {
        let realized = if delta.is_positive() {
            self.buy(delta)?
        } else if delta.is_negative() {
            -self.sell(delta.abs())?
        } else {
            Fixed::ZERO
        };

        if realized != delta {
            debug!("{}: asked {} realized {}", self.name, delta, realized);
        }
        Ok(realized)
    }

    fn delta(&self) -> Fixed {
        self.underlying_balance
    }

    fn pool_denominated_value(&self) -> crate::Result<Fixed> {
        let price = self.venue.price()?;
        Ok(self.collateral_balance + self.underlying_balance.mul(price))
    }

    fn withdraw(&mut self, amount: Fixed, asset: &Asset) -> crate::Result<Fixed> {
        if asset != &self.collateral_asset {
            return Err(crate::Error::Venue(format!(
                "{} holds {}, cannot withdraw {}",
                self.name, self.collateral_asset, asset
            )));
        }

        let shortfall = amount - self.collateral_balance;
        if shortfall.is_positive() {
            let price = self.venue.price()?;
            // Round up so the sale covers the shortfall
            let needed = shortfall.div(price) + Fixed::from_raw(1);
            if let Err(e) = self.sell(needed) {
                warn!("{}: could not unwind for withdrawal: {}", self.name, e);
            }
        }

        let released = amount.min(self.collateral_balance).floor_zero();
        self.collateral_balance -= released;
        Ok(released)
    }

    fn fund(&mut self, amount: Fixed, asset: &Asset) -> crate::Result<()> {
        if asset != &self.collateral_asset {
            return Err(crate::Error::Venue(format!(
                "{} holds {}, cannot take {}",
                self.name, self.collateral_asset, asset
            )));
        }
        if !amount.is_positive() {
            return Err(crate::Error::BoundsViolation(format!(
                "{}: funding must be positive, got {}",
                self.name, amount
            )));
        }
        self.deposit(amount);
        Ok(())
    }

    fn update(&mut self) -> crate::Result<Fixed> {
        Ok(Fixed::ZERO)
    }
}
