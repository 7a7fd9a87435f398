use crate::collateral::{MarginProtocol, VaultId, VaultStatus};
use crate::market_data::OptionSeries;
use crate::utils::Fixed;
use ahash::AHashMap;
use parking_lot::Mutex;

#[derive(Debug, Clone)]
struct PaperVault {
    series: OptionSeries,
    posted: Fixed,
    short_amount: Fixed,
    liquidated: bool,
}

struct ProtocolState {
    next_id: VaultId,
    vaults: AHashMap<VaultId, PaperVault>,
    margin_bps: u32,
    spot: Fixed,
    settlement_price: Option<Fixed>,
    failing: bool,
}

/// Fully collateralised margin protocol kept in memory
///
/// Naked margin is `margin_bps` of the per-contract exposure: the strike for
/// puts and spot for calls.
pub struct PaperMarginProtocol {
    state: Mutex<ProtocolState>,
}

impl PaperMarginProtocol {
    pub fn new(margin_bps: u32) -> Self {
        Self {
            state: Mutex::new(ProtocolState {
                next_id: 1,
                vaults: AHashMap::new(),
                margin_bps,
                spot: Fixed::ZERO,
                settlement_price: None,
                failing: false,
            }),
        }
    }

    pub fn set_margin_bps(&self, margin_bps: u32) {
        self.state.lock().margin_bps = margin_bps;
    }

    /// Spot used by `is_liquidatable`
    pub fn set_spot(&self, spot: Fixed) {
        self.state.lock().spot = spot;
    }

    /// Expiry price used when vaults settle; `None` settles everything out of the money
    pub fn set_settlement_price(&self, price: Option<Fixed>) {
        self.state.lock().settlement_price = price;
    }

    /// Make every state-changing call fail
    pub fn set_failing(&self, failing: bool) {
        self.state.lock().failing = failing;
    }

    /// Overwrite a vault's posted collateral
    pub fn force_posted(&self, vault: VaultId, posted: Fixed) {
        if let Some(v) = self.state.lock().vaults.get_mut(&vault) {
            v.posted = posted;
        }
    }

    /// Liquidate a vault, leaving `residual` collateral behind
    pub fn liquidate(&self, vault: VaultId, residual: Fixed) {
        if let Some(v) = self.state.lock().vaults.get_mut(&vault) {
            v.liquidated = true;
            v.short_amount = Fixed::ZERO;
            v.posted = residual;
        }
    }

    pub fn posted(&self, vault: VaultId) -> Option<Fixed> {
        self.state.lock().vaults.get(&vault).map(|v| v.posted)
    }

    fn margin(series: &OptionSeries, amount: Fixed, spot: Fixed, margin_bps: u32) -> Fixed {
        let per_contract = if series.is_put { series.strike } else { spot };
        per_contract.mul(amount).bps_ceil(margin_bps)
    }

    /// Cash value of `amount` contracts at the expiry price
    fn settlement_value(series: &OptionSeries, amount: Fixed, settlement: Option<Fixed>) -> Fixed {
        match settlement {
            Some(price) => {
                let intrinsic = if series.is_put {
                    series.strike - price
                } else {
                    price - series.strike
                };
                intrinsic.floor_zero().mul(amount)
            }
            None => Fixed::ZERO,
        }
    }

    fn mutate<T>(
        &self,
        vault: VaultId,
        f: impl FnOnce(&mut PaperVault) -> crate::Result<T>,
    ) -> crate::Result<T> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(crate::Error::Venue("margin protocol unavailable".into()));
        }
        let v = state
            .vaults
            .get_mut(&vault)
            .ok_or_else(|| crate::Error::Venue(format!("no vault {}", vault)))?;
        f(v)
    }
}

impl MarginProtocol for PaperMarginProtocol {
    fn open_vault(&self, series: &OptionSeries) -> crate::Result<VaultId> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(crate::Error::Venue("margin protocol unavailable".into()));
        }
        let id = state.next_id;
        state.next_id += 1;
        state.vaults.insert(
            id,
            PaperVault {
                series: series.clone(),
                posted: Fixed::ZERO,
                short_amount: Fixed::ZERO,
                liquidated: false,
            },
        );
        Ok(id)
    }

    fn deposit_collateral(&self, vault: VaultId, amount: Fixed) -> crate::Result<()> {
        self.mutate(vault, |v| {
            v.posted += amount;
            Ok(())
        })
    }

    fn withdraw_collateral(&self, vault: VaultId, amount: Fixed) -> crate::Result<()> {
        self.mutate(vault, |v| {
            if amount > v.posted {
                return Err(crate::Error::Venue(format!(
                    "withdraw {} exceeds posted {}",
                    amount, v.posted
                )));
            }
            v.posted -= amount;
            Ok(())
        })
    }

    fn mint_short(&self, vault: VaultId, amount: Fixed) -> crate::Result<()> {
        self.mutate(vault, |v| {
            v.short_amount += amount;
            Ok(())
        })
    }

    fn burn_short(&self, vault: VaultId, amount: Fixed) -> crate::Result<()> {
        self.mutate(vault, |v| {
            if amount > v.short_amount {
                return Err(crate::Error::Venue(format!(
                    "burn {} exceeds short {}",
                    amount, v.short_amount
                )));
            }
            v.short_amount -= amount;
            Ok(())
        })
    }

    fn settle_vault(&self, vault: VaultId) -> crate::Result<Fixed> {
        let mut state = self.state.lock();
        if state.failing {
            return Err(crate::Error::Venue("margin protocol unavailable".into()));
        }
        let settlement = state.settlement_price;
        let v = state
            .vaults
            .remove(&vault)
            .ok_or_else(|| crate::Error::Venue(format!("no vault {}", vault)))?;

        let payout = Self::settlement_value(&v.series, v.short_amount, settlement);
        Ok((v.posted - payout).floor_zero())
    }

    fn redeem_long(&self, series: &OptionSeries, amount: Fixed) -> crate::Result<Fixed> {
        let state = self.state.lock();
        if state.failing {
            return Err(crate::Error::Venue("margin protocol unavailable".into()));
        }
        Ok(Self::settlement_value(series, amount, state.settlement_price))
    }

    fn vault_status(&self, vault: VaultId) -> crate::Result<VaultStatus> {
        let state = self.state.lock();
        let v = state
            .vaults
            .get(&vault)
            .ok_or_else(|| crate::Error::Venue(format!("no vault {}", vault)))?;
        Ok(VaultStatus {
            posted: v.posted,
            short_amount: v.short_amount,
            liquidated: v.liquidated,
        })
    }

    fn reclaim_residual(&self, vault: VaultId) -> crate::Result<Fixed> {
        self.mutate(vault, |v| {
            if !v.liquidated {
                return Err(crate::Error::Venue(format!("vault {} is not liquidated", vault)));
            }
            let residual = v.posted;
            v.posted = Fixed::ZERO;
            Ok(residual)
        })
    }

    fn naked_margin_required(
        &self,
        series: &OptionSeries,
        amount: Fixed,
        spot: Fixed,
    ) -> crate::Result<Fixed> {
        let margin_bps = self.state.lock().margin_bps;
        Ok(Self::margin(series, amount, spot, margin_bps))
    }

    fn is_liquidatable(&self, vault: VaultId) -> crate::Result<bool> {
        let state = self.state.lock();
        let v = state
            .vaults
            .get(&vault)
            .ok_or_else(|| crate::Error::Venue(format!("no vault {}", vault)))?;
        if v.liquidated || state.spot.is_zero() {
            return Ok(false);
        }
        let required = Self::margin(&v.series, v.short_amount, state.spot, state.margin_bps);
        Ok(v.posted < required)
    }
}
