use crate::hedging::{HedgingReactor, PerpVenue};
use crate::market_data::Asset;
use crate::utils::{Fixed, MAX_BPS};
use log::{debug, info, warn};
use std::sync::Arc;

/// Hedges with a signed perpetual-futures position
///
/// Margin is kept at `health_factor_bps` of position notional. Exposure is
/// limited by the collateral the reactor can post.
pub struct PerpReactor {
    name: String,
    venue: Arc<dyn PerpVenue>,
    collateral_asset: Asset,
    health_factor_bps: u32,
    position: Fixed,
    free_collateral: Fixed,
}

impl PerpReactor {
    pub fn new(
        name: impl Into<String>,
        venue: Arc<dyn PerpVenue>,
        collateral_asset: Asset,
        health_factor_bps: u32,
    ) -> crate::Result<Self> {
        if health_factor_bps == 0 {
            return Err(crate::Error::ConfigInvalid(
                "perp health factor must be positive".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            venue,
            collateral_asset,
            health_factor_bps,
            position: Fixed::ZERO,
            free_collateral: Fixed::ZERO,
        })
    }

    /// Fund the reactor with collateral
    pub fn deposit(&mut self, amount: Fixed) {
        self.free_collateral += amount.floor_zero();
    }

    pub fn free_collateral(&self) -> Fixed {
        self.free_collateral
    }

    pub fn health_factor_bps(&self) -> u32 {
        self.health_factor_bps
    }

    /// Margin a position of `size` needs at `price`
    pub fn required_margin(&self, size: Fixed, price: Fixed) -> Fixed {
        size.abs().mul(price).bps_ceil(self.health_factor_bps)
    }

    /// Largest |position| the reactor's total collateral supports
    fn max_position(&self, price: Fixed, margin: Fixed) -> Fixed {
        let budget = margin + self.free_collateral;
        let per_unit = price.bps_ceil(self.health_factor_bps);
        budget.div(per_unit)
    }
}

impl HedgingReactor for PerpReactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn hedge_delta(&mut self, delta: Fixed) -> crate::Result<Fixed> {
        if delta.is_zero() {
            return Ok(Fixed::ZERO);
        }

        let price = self.venue.mark_price()?;
        let margin = self.venue.margin()?;
        let wanted = self.position + delta;

        let target = if wanted.abs() <= self.position.abs() {
            wanted
        } else {
            let cap = self.max_position(price, margin);
            let capped = wanted.abs().min(cap.max(self.position.abs()));
            if wanted.is_negative() { -capped } else { capped }
        };

        let size = target - self.position;
        if size.is_zero() {
            return Ok(Fixed::ZERO);
        }

        // Post margin first when growing, release it after when shrinking
        if target.abs() > self.position.abs() {
            let needed = (self.required_margin(target, price) - margin).floor_zero();
            let posted = needed.min(self.free_collateral);
            if posted.is_positive() {
                self.venue.deposit_margin(posted)?;
                self.free_collateral -= posted;
            }
        }

        let filled = self.venue.trade(size)?;
        self.position += filled;

        if let Err(e) = self.update() {
            warn!("{}: margin re-sync after trade failed: {}", self.name, e);
        }

        debug!(
            "{}: asked {} filled {} position {}",
            self.name, delta, filled, self.position
        );
        Ok(filled)
    }

    fn delta(&self) -> Fixed {
        self.position
    }

    fn pool_denominated_value(&self) -> crate::Result<Fixed> {
        Ok(self.free_collateral + self.venue.margin()?)
    }

    fn withdraw(&mut self, amount: Fixed, asset: &Asset) -> crate::Result<Fixed> {
        if asset != &self.collateral_asset {
            return Err(crate::Error::Venue(format!(
                "{} holds {}, cannot withdraw {}",
                self.name, self.collateral_asset, asset
            )));
        }

        let shortfall = amount - self.free_collateral;
        if shortfall.is_positive() {
            let price = self.venue.mark_price()?;
            let margin = self.venue.margin()?;
            let remaining_margin = (margin - shortfall).floor_zero();
            let per_unit = price.bps_ceil(self.health_factor_bps);
            let max_abs = remaining_margin.div(per_unit);

            if self.position.abs() > max_abs {
                let target = if self.position.is_negative() { -max_abs } else { max_abs };
                match self.venue.trade(target - self.position) {
                    Ok(filled) => self.position += filled,
                    Err(e) => warn!("{}: could not reduce position for withdrawal: {}", self.name, e),
                }
            }
            if let Err(e) = self.update() {
                warn!("{}: could not release margin for withdrawal: {}", self.name, e);
            }
        }

        let released = amount.min(self.free_collateral).floor_zero();
        self.free_collateral -= released;
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
        let price = self.venue.mark_price()?;
        let margin = self.venue.margin()?;
        let required = self.required_margin(self.position, price);

        if margin < required {
            let top_up = (required - margin).min(self.free_collateral);
            if top_up.is_positive() {
                self.venue.deposit_margin(top_up)?;
                self.free_collateral -= top_up;
            }
            if top_up < required - margin {
                warn!(
                    "{}: margin {} below required {} and no free collateral left",
                    self.name,
                    margin + top_up,
                    required
                );
            }
            Ok(top_up)
        } else if margin > required {
            let excess = margin - required;
            self.venue.withdraw_margin(excess)?;
            self.free_collateral += excess;
            info!("{}: released {} excess margin", self.name, excess);
            Ok(-excess)
        } else {
            Ok(Fixed::ZERO)
        }
    }
}

/// Margin ratio implied by `margin / notional`, in bps
pub fn margin_ratio_bps(margin: Fixed, size: Fixed, price: Fixed) -> u64 {
    let notional = size.abs().mul(price);
    if notional.is_zero() {
        return u64::MAX;
    }
    (margin.raw() as i128 * MAX_BPS as i128 / notional.raw() as i128).max(0) as u64
}
