use crate::collateral::{
    CollateralPool, CollateralVault, HealthBounds, HealthStatus, MarginProtocol, SideHealthBounds,
    VaultHealth, VaultId, VaultState, health_factor,
};
use crate::market_data::{Asset, OptionSeries, OptionSide, SeriesKey};
use crate::utils::Fixed;
use ahash::AHashMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of one `adjust_collateral` call
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralAdjustment {
    pub vault_id: VaultId,
    pub status_before: HealthStatus,

    /// Signed collateral moved into the vault (negative = withdrawn)
    pub moved: Fixed,

    pub health_after: u64,
}

impl CollateralAdjustment {
    pub fn is_noop(&self) -> bool {
        self.moved.is_zero()
    }
}

/// Collateral and exposure released when a vault leaves the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultClosure {
    pub vault_id: VaultId,
    pub series: OptionSeries,

    /// Short contracts that no longer exist
    pub short_amount: Fixed,

    /// Collateral returned to the pool
    pub returned: Fixed,
}

/// Persisted form of the monitor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MonitorState {
    pub bounds: SideHealthBounds,
    pub vaults: Vec<CollateralVault>,

    /// Collateral released by the protocol that the pool has not accepted
    #[serde(default)]
    pub uncredited: Vec<(Asset, Fixed)>,
}

/// Keeps every vault between its side's health bounds
///
/// Once the protocol has settled, reclaimed or released collateral the vault
/// table follows the protocol even if the pool then refuses the credit. The
/// refused amount is parked per asset and handed over by
/// [`retry_uncredited`](Self::retry_uncredited).
pub struct CollateralHealthMonitor {
    bounds: SideHealthBounds,
    vaults: AHashMap<VaultId, CollateralVault>,
    by_series: AHashMap<SeriesKey, VaultId>,
    uncredited: BTreeMap<Asset, Fixed>,
}

impl CollateralHealthMonitor {
    pub fn new(bounds: SideHealthBounds) -> crate::Result<Self> {
        bounds.validate()?;
        Ok(Self {
            bounds,
            vaults: AHashMap::new(),
            by_series: AHashMap::new(),
            uncredited: BTreeMap::new(),
        })
    }

    pub fn from_state(state: MonitorState) -> crate::Result<Self> {
        let mut monitor = Self::new(state.bounds)?;
        for vault in state.vaults {
            monitor.insert(vault);
        }
        for (asset, amount) in state.uncredited {
            monitor.park(&asset, amount);
        }
        Ok(monitor)
    }

    pub fn state(&self) -> MonitorState {
        let mut vaults: Vec<CollateralVault> = self.vaults.values().cloned().collect();
        vaults.sort_by_key(|v| v.id);
        MonitorState {
            bounds: self.bounds,
            vaults,
            uncredited: self
                .uncredited
                .iter()
                .map(|(asset, amount)| (asset.clone(), *amount))
                .collect(),
        }
    }

    pub fn bounds(&self, side: OptionSide) -> &HealthBounds {
        self.bounds.get(side)
    }

    pub fn set_bounds(&mut self, side: OptionSide, bounds: HealthBounds) -> crate::Result<()> {
        bounds.validate()?;
        match side {
            OptionSide::Call => self.bounds.call = bounds,
            OptionSide::Put => self.bounds.put = bounds,
        }
        info!("{} health bounds set to [{}, {}]", side, bounds.lower, bounds.upper);
        Ok(())
    }

    pub fn vault(&self, id: VaultId) -> Option<&CollateralVault> {
        self.vaults.get(&id)
    }

    pub fn vault_for_series(&self, key: &SeriesKey) -> Option<&CollateralVault> {
        self.by_series.get(key).and_then(|id| self.vaults.get(id))
    }

    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    /// Vault ids in ascending order
    pub fn vault_ids(&self) -> Vec<VaultId> {
        let mut ids: Vec<VaultId> = self.vaults.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn total_posted(&self) -> Fixed {
        self.vaults.values().map(|v| v.posted).sum()
    }

    /// Collateral owed to the pool that a credit failed to deliver
    pub fn uncredited(&self, asset: &Asset) -> Fixed {
        self.uncredited.get(asset).copied().unwrap_or(Fixed::ZERO)
    }

    /// Credit the pool, parking `amount` if the pool refuses it
    ///
    /// Returns whether the credit went through.
    pub fn credit_or_park(&mut self, pool: &dyn CollateralPool, asset: &Asset, amount: Fixed) -> bool {
        if amount.is_zero() {
            return true;
        }
        match pool.credit(asset, amount) {
            Ok(()) => true,
            Err(e) => {
                warn!("pool refused {} {}, parked for retry: {}", amount, asset, e);
                self.park(asset, amount);
                false
            }
        }
    }

    /// Hand every parked amount to the pool
    ///
    /// Amounts the pool accepts are cleared; the rest stay parked and the
    /// first refusal is returned.
    pub fn retry_uncredited(&mut self, pool: &dyn CollateralPool) -> crate::Result<Fixed> {
        let mut credited = Fixed::ZERO;
        let mut first_error = None;
        for (asset, amount) in std::mem::take(&mut self.uncredited) {
            match pool.credit(&asset, amount) {
                Ok(()) => credited += amount,
                Err(e) => {
                    self.uncredited.insert(asset, amount);
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if !credited.is_zero() {
            info!("credited {} of parked collateral to the pool", credited);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(credited),
        }
    }

    pub fn required_margin(
        &self,
        id: VaultId,
        protocol: &dyn MarginProtocol,
        spot: Fixed,
    ) -> crate::Result<Fixed> {
        let vault = self.get(id)?;
        protocol.naked_margin_required(&vault.series, vault.short_amount, spot)
    }

    pub fn health(
        &self,
        id: VaultId,
        protocol: &dyn MarginProtocol,
        spot: Fixed,
    ) -> crate::Result<VaultHealth> {
        let vault = self.get(id)?;
        let required = protocol.naked_margin_required(&vault.series, vault.short_amount, spot)?;
        let factor = health_factor(vault.posted, required);
        let status = if vault.posted.is_zero() && required.is_zero() {
            HealthStatus::Healthy
        } else {
            self.bounds(vault.series.side()).classify(factor)
        };

        Ok(VaultHealth {
            vault_id: id,
            posted: vault.posted,
            required,
            health_factor: factor,
            status,
            liquidatable: protocol.is_liquidatable(id)?,
        })
    }

    /// Fail with `HealthFactorBreach` unless the vault sits inside its bounds
    pub fn require_healthy(
        &self,
        id: VaultId,
        protocol: &dyn MarginProtocol,
        spot: Fixed,
    ) -> crate::Result<()> {
        let health = self.health(id, protocol, spot)?;
        if health.status == HealthStatus::Healthy {
            return Ok(());
        }
        let bounds = self.bounds(self.get(id)?.series.side());
        Err(crate::Error::HealthFactorBreach {
            vault_id: id,
            health_factor: health.health_factor,
            lower: bounds.lower,
            upper: bounds.upper,
        })
    }

    /// Health of every vault, ascending by id
    pub fn scan(
        &self,
        protocol: &dyn MarginProtocol,
        spot: Fixed,
    ) -> crate::Result<Vec<VaultHealth>> {
        self.vault_ids()
            .into_iter()
            .map(|id| self.health(id, protocol, spot))
            .collect()
    }

    /// Bring a vault back to its upper bound
    ///
    /// Healthy vaults are left alone, so a second call straight after a
    /// successful one moves nothing.
    pub fn adjust_collateral(
        &mut self,
        id: VaultId,
        protocol: &dyn MarginProtocol,
        pool: &dyn CollateralPool,
        spot: Fixed,
    ) -> crate::Result<CollateralAdjustment> {
        let health = self.health(id, protocol, spot)?;
        let vault = self.get(id)?;
        if !vault.is_active() {
            return Err(crate::Error::InvalidState(format!(
                "vault {} is liquidated; sweep it instead",
                id
            )));
        }

        let asset = vault.series.collateral_asset.clone();
        let target = self.bounds(vault.series.side()).target(health.required);
        let previous = vault.posted;

        let moved = match health.status {
            HealthStatus::Healthy => Fixed::ZERO,
            HealthStatus::NeedsTopUp => {
                let top_up = target - previous;
                let available = pool.available(&asset);
                if available < top_up {
                    return Err(crate::Error::InsufficientLiquidity {
                        requested: top_up,
                        available,
                    });
                }

                self.set_posted(id, target);
                if let Err(e) = pool.debit(&asset, top_up) {
                    self.set_posted(id, previous);
                    return Err(e);
                }
                if let Err(e) = protocol.deposit_collateral(id, top_up) {
                    self.set_posted(id, previous);
                    refund(pool, &asset, top_up);
                    return Err(e);
                }
                top_up
            }
            HealthStatus::Excess => {
                let excess = previous - target;
                if excess.is_positive() {
                    self.set_posted(id, target);
                    if let Err(e) = protocol.withdraw_collateral(id, excess) {
                        self.set_posted(id, previous);
                        return Err(e);
                    }
                    if let Err(e) = pool.credit(&asset, excess) {
                        if let Err(redeposit) = protocol.deposit_collateral(id, excess) {
                            warn!("vault {}: could not re-deposit {} after failed credit: {}", id, excess, redeposit);
                            self.park(&asset, excess);
                        } else {
                            self.set_posted(id, previous);
                            return Err(e);
                        }
                    }
                    -excess
                } else {
                    Fixed::ZERO
                }
            }
        };

        let posted = self.get(id)?.posted;
        let adjustment = CollateralAdjustment {
            vault_id: id,
            status_before: health.status,
            moved,
            health_after: health_factor(posted, health.required),
        };
        if !moved.is_zero() {
            info!(
                "vault {} {}: moved {} collateral, health {} -> {}",
                id, health.status, moved, health.health_factor, adjustment.health_after
            );
        }
        Ok(adjustment)
    }

    /// Write `amount` more contracts of `series`, funding the vault to its
    /// upper bound. Returns the vault id.
    pub fn open_position(
        &mut self,
        series: &OptionSeries,
        amount: Fixed,
        protocol: &dyn MarginProtocol,
        pool: &dyn CollateralPool,
        spot: Fixed,
    ) -> crate::Result<VaultId> {
        if !amount.is_positive() {
            return Err(crate::Error::BoundsViolation(format!(
                "short amount must be positive, got {}",
                amount
            )));
        }

        let key = series.key();
        let existing = self.by_series.get(&key).and_then(|id| self.vaults.get(id)).cloned();
        if let Some(vault) = &existing {
            if !vault.is_active() {
                return Err(crate::Error::InvalidState(format!(
                    "vault {} for {} is liquidated",
                    vault.id, series
                )));
            }
        }

        let short_after = existing.as_ref().map_or(Fixed::ZERO, |v| v.short_amount) + amount;
        let posted_before = existing.as_ref().map_or(Fixed::ZERO, |v| v.posted);
        let required = protocol.naked_margin_required(series, short_after, spot)?;
        let target = self.bounds(series.side()).target(required);
        let deposit = (target - posted_before).floor_zero();

        let asset = series.collateral_asset.clone();
        let available = pool.available(&asset);
        if available < deposit {
            return Err(crate::Error::InsufficientLiquidity {
                requested: deposit,
                available,
            });
        }

        let id = match &existing {
            Some(vault) => vault.id,
            None => protocol.open_vault(series)?,
        };

        let mut updated = existing
            .clone()
            .unwrap_or_else(|| CollateralVault::new(id, series.clone()));
        updated.short_amount = short_after;
        updated.posted = posted_before + deposit;
        self.insert(updated);

        let rollback = |monitor: &mut Self| match &existing {
            Some(vault) => monitor.insert(vault.clone()),
            None => {
                monitor.remove(id);
            }
        };

        if !deposit.is_zero() {
            if let Err(e) = pool.debit(&asset, deposit) {
                rollback(self);
                return Err(e);
            }
            if let Err(e) = protocol.deposit_collateral(id, deposit) {
                rollback(self);
                refund(pool, &asset, deposit);
                return Err(e);
            }
        }
        if let Err(e) = protocol.mint_short(id, amount) {
            rollback(self);
            if !deposit.is_zero() {
                if let Err(withdraw) = protocol.withdraw_collateral(id, deposit) {
                    warn!("vault {}: deposit of {} stranded after failed mint: {}", id, deposit, withdraw);
                } else {
                    refund(pool, &asset, deposit);
                }
            }
            return Err(e);
        }

        debug!(
            "vault {} wrote {} of {} (short {}, posted {})",
            id,
            amount,
            series,
            short_after,
            posted_before + deposit
        );
        Ok(id)
    }

    /// Buy back `amount` contracts and release collateral pro rata
    pub fn close_position(
        &mut self,
        id: VaultId,
        amount: Fixed,
        protocol: &dyn MarginProtocol,
        pool: &dyn CollateralPool,
    ) -> crate::Result<Fixed> {
        let vault = self.get(id)?.clone();
        if !vault.is_active() {
            return Err(crate::Error::InvalidState(format!("vault {} is liquidated", id)));
        }
        if !amount.is_positive() || amount > vault.short_amount {
            return Err(crate::Error::BoundsViolation(format!(
                "cannot close {} of vault {} holding {}",
                amount, id, vault.short_amount
            )));
        }

        let release = if amount == vault.short_amount {
            vault.posted
        } else {
            vault.posted.mul_div(amount, vault.short_amount)
        };

        let mut updated = vault.clone();
        updated.short_amount = vault.short_amount - amount;
        updated.posted = vault.posted - release;
        let closes = updated.short_amount.is_zero() && updated.posted.is_zero();
        if closes {
            self.remove(id);
        } else {
            self.insert(updated);
        }

        let asset = vault.series.collateral_asset.clone();
        if let Err(e) = protocol.burn_short(id, amount) {
            self.insert(vault);
            return Err(e);
        }
        if !release.is_zero() {
            if let Err(e) = protocol.withdraw_collateral(id, release) {
                self.insert(vault.clone());
                if let Err(remint) = protocol.mint_short(id, amount) {
                    warn!("vault {}: could not re-mint {} after failed withdraw: {}", id, amount, remint);
                }
                return Err(e);
            }
            self.credit_or_park(pool, &asset, release);
        }

        debug!("vault {} closed {} contracts, released {}", id, amount, release);
        Ok(release)
    }

    /// Settle an expired vault and return its collateral to the pool
    pub fn settle_vault(
        &mut self,
        id: VaultId,
        protocol: &dyn MarginProtocol,
        pool: &dyn CollateralPool,
        now: u64,
    ) -> crate::Result<VaultClosure> {
        let vault = self.get(id)?.clone();
        if !vault.series.is_expired(now) {
            return Err(crate::Error::InvalidState(format!(
                "vault {} series {} has not expired",
                id, vault.series
            )));
        }
        if !vault.is_active() {
            return Err(crate::Error::InvalidState(format!(
                "vault {} is liquidated; sweep it instead",
                id
            )));
        }

        self.remove(id);
        let returned = match protocol.settle_vault(id) {
            Ok(returned) => returned,
            Err(e) => {
                self.insert(vault);
                return Err(e);
            }
        };
        self.credit_or_park(pool, &vault.series.collateral_asset, returned);

        info!("vault {} settled, {} returned to pool", id, returned);
        Ok(VaultClosure {
            vault_id: id,
            series: vault.series,
            short_amount: vault.short_amount,
            returned,
        })
    }

    /// Pull the protocol's view of a vault and flag it if liquidated
    pub fn refresh_vault(
        &mut self,
        id: VaultId,
        protocol: &dyn MarginProtocol,
    ) -> crate::Result<VaultState> {
        let status = protocol.vault_status(id)?;
        let vault = self.get_mut(id)?;
        if status.liquidated && vault.state == VaultState::Active {
            warn!("vault {} was liquidated by the protocol", id);
            vault.state = VaultState::Liquidated;
        }
        Ok(vault.state)
    }

    /// Reclaim what is left of a liquidated vault and drop it from the table
    pub fn sweep_liquidated_vault(
        &mut self,
        id: VaultId,
        protocol: &dyn MarginProtocol,
        pool: &dyn CollateralPool,
    ) -> crate::Result<VaultClosure> {
        let vault = self.get(id)?.clone();
        let status = protocol.vault_status(id)?;
        if !status.liquidated {
            return Err(crate::Error::InvalidState(format!(
                "vault {} has not been liquidated",
                id
            )));
        }

        self.remove(id);
        let reclaimed = match protocol.reclaim_residual(id) {
            Ok(amount) => amount,
            Err(e) => {
                let mut restored = vault;
                restored.state = VaultState::Liquidated;
                self.insert(restored);
                return Err(e);
            }
        };
        self.credit_or_park(pool, &vault.series.collateral_asset, reclaimed);

        info!(
            "swept liquidated vault {}: {} short closed, {} reclaimed",
            id, vault.short_amount, reclaimed
        );
        Ok(VaultClosure {
            vault_id: id,
            series: vault.series,
            short_amount: vault.short_amount,
            returned: reclaimed,
        })
    }

    fn get(&self, id: VaultId) -> crate::Result<&CollateralVault> {
        self.vaults
            .get(&id)
            .ok_or_else(|| crate::Error::InvalidState(format!("unknown vault {}", id)))
    }

    fn get_mut(&mut self, id: VaultId) -> crate::Result<&mut CollateralVault> {
        self.vaults
            .get_mut(&id)
            .ok_or_else(|| crate::Error::InvalidState(format!("unknown vault {}", id)))
    }

    fn set_posted(&mut self, id: VaultId, posted: Fixed) {
        if let Some(vault) = self.vaults.get_mut(&id) {
            vault.posted = posted;
        }
    }

    fn park(&mut self, asset: &Asset, amount: Fixed) {
        if amount.is_zero() {
            return;
        }
        *self.uncredited.entry(asset.clone()).or_insert(Fixed::ZERO) += amount;
    }

    fn insert(&mut self, vault: CollateralVault) {
        self.by_series.insert(vault.series.key(), vault.id);
        self.vaults.insert(vault.id, vault);
    }

    fn remove(&mut self, id: VaultId) -> Option<CollateralVault> {
        let vault = self.vaults.remove(&id)?;
        if self.by_series.get(&vault.series.key()) == Some(&id) {
            self.by_series.remove(&vault.series.key());
        }
        Some(vault)
    }
}

fn refund(pool: &dyn CollateralPool, asset: &Asset, amount: Fixed) {
    if let Err(e) = pool.credit(asset, amount) {
        warn!("failed to refund {} {} to pool: {}", amount, asset, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Asset;
    use crate::sim::{PaperCollateralPool, PaperMarginProtocol};

    const NOW: u64 = 1_700_000_000;

    fn series() -> OptionSeries {
        OptionSeries::new(
            NOW + 14 * 86_400,
            Fixed::from_int(2000),
            true,
            Asset::new("WETH"),
            Asset::new("USDC"),
            Asset::new("USDC"),
        )
    }

    fn setup() -> (CollateralHealthMonitor, PaperMarginProtocol, PaperCollateralPool) {
        let monitor = CollateralHealthMonitor::new(SideHealthBounds::default()).unwrap();
        // Puts need the full strike as margin
        let protocol = PaperMarginProtocol::new(MAX_MARGIN_BPS);
        let pool = PaperCollateralPool::new();
        pool.set_balance(&Asset::new("USDC"), Fixed::from_int(100_000));
        (monitor, protocol, pool)
    }

    const MAX_MARGIN_BPS: u32 = 10_000;

    #[test]
    fn test_open_funds_to_upper_bound() {
        let (mut monitor, protocol, pool) = setup();
        let spot = Fixed::from_int(2000);
        let id = monitor
            .open_position(&series(), Fixed::ONE, &protocol, &pool, spot)
            .unwrap();

        let health = monitor.health(id, &protocol, spot).unwrap();
        assert_eq!(health.required, Fixed::from_int(2000));
        assert_eq!(health.posted, Fixed::from_int(2600));
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(pool.available(&Asset::new("USDC")), Fixed::from_int(97_400));
    }

    #[test]
    fn test_top_up_is_idempotent() {
        let (mut monitor, protocol, pool) = setup();
        let spot = Fixed::from_int(2000);
        let id = monitor
            .open_position(&series(), Fixed::ONE, &protocol, &pool, spot)
            .unwrap();

        // Drop collateral to 80% of required
        monitor.set_posted(id, Fixed::from_int(1600));
        protocol.force_posted(id, Fixed::from_int(1600));
        assert_eq!(monitor.health(id, &protocol, spot).unwrap().health_factor, 8_000);

        let first = monitor.adjust_collateral(id, &protocol, &pool, spot).unwrap();
        assert_eq!(first.status_before, HealthStatus::NeedsTopUp);
        assert_eq!(first.moved, Fixed::from_int(1000));
        assert!(first.health_after.abs_diff(13_000) <= 1);

        let second = monitor.adjust_collateral(id, &protocol, &pool, spot).unwrap();
        assert!(second.is_noop());
    }

    #[test]
    fn test_excess_is_withdrawn() {
        let (mut monitor, protocol, pool) = setup();
        let id = monitor
            .open_position(&series(), Fixed::ONE, &protocol, &pool, Fixed::from_int(2000))
            .unwrap();
        let before = pool.available(&Asset::new("USDC"));

        // A lower requirement leaves the vault over-collateralised
        protocol.set_margin_bps(5_000);
        let adjustment = monitor
            .adjust_collateral(id, &protocol, &pool, Fixed::from_int(2000))
            .unwrap();
        assert_eq!(adjustment.status_before, HealthStatus::Excess);
        assert_eq!(adjustment.moved, -Fixed::from_int(1300));
        assert_eq!(pool.available(&Asset::new("USDC")), before + Fixed::from_int(1300));
    }

    #[test]
    fn test_top_up_without_liquidity_changes_nothing() {
        let (mut monitor, protocol, pool) = setup();
        let spot = Fixed::from_int(2000);
        let id = monitor
            .open_position(&series(), Fixed::ONE, &protocol, &pool, spot)
            .unwrap();
        monitor.set_posted(id, Fixed::from_int(1600));
        protocol.force_posted(id, Fixed::from_int(1600));
        pool.set_balance(&Asset::new("USDC"), Fixed::from_int(10));

        let result = monitor.adjust_collateral(id, &protocol, &pool, spot);
        assert!(matches!(result, Err(crate::Error::InsufficientLiquidity { .. })));
        assert_eq!(monitor.vault(id).unwrap().posted, Fixed::from_int(1600));
    }

    #[test]
    fn test_failed_deposit_rolls_back() {
        let (mut monitor, protocol, pool) = setup();
        let spot = Fixed::from_int(2000);
        let id = monitor
            .open_position(&series(), Fixed::ONE, &protocol, &pool, spot)
            .unwrap();
        monitor.set_posted(id, Fixed::from_int(1600));
        protocol.force_posted(id, Fixed::from_int(1600));
        let before = pool.available(&Asset::new("USDC"));

        protocol.set_failing(true);
        assert!(monitor.adjust_collateral(id, &protocol, &pool, spot).is_err());
        assert_eq!(monitor.vault(id).unwrap().posted, Fixed::from_int(1600));
        assert_eq!(pool.available(&Asset::new("USDC")), before);
    }

    #[test]
    fn test_sweep_requires_liquidation() {
        let (mut monitor, protocol, pool) = setup();
        let spot = Fixed::from_int(2000);
        let id = monitor
            .open_position(&series(), Fixed::from_int(2), &protocol, &pool, spot)
            .unwrap();

        assert!(matches!(
            monitor.sweep_liquidated_vault(id, &protocol, &pool),
            Err(crate::Error::InvalidState(_))
        ));

        protocol.liquidate(id, Fixed::from_int(300));
        assert_eq!(monitor.refresh_vault(id, &protocol).unwrap(), VaultState::Liquidated);

        let before = pool.available(&Asset::new("USDC"));
        let closure = monitor.sweep_liquidated_vault(id, &protocol, &pool).unwrap();
        assert_eq!(closure.short_amount, Fixed::from_int(2));
        assert_eq!(closure.returned, Fixed::from_int(300));
        assert_eq!(pool.available(&Asset::new("USDC")), before + Fixed::from_int(300));
        assert!(monitor.vault(id).is_none());
    }

    #[test]
    fn test_close_releases_pro_rata() {
        let (mut monitor, protocol, pool) = setup();
        let spot = Fixed::from_int(2000);
        let id = monitor
            .open_position(&series(), Fixed::from_int(4), &protocol, &pool, spot)
            .unwrap();
        let posted = monitor.vault(id).unwrap().posted;

        let released = monitor
            .close_position(id, Fixed::ONE, &protocol, &pool)
            .unwrap();
        assert_eq!(released, posted.mul_div(Fixed::ONE, Fixed::from_int(4)));
        assert_eq!(monitor.vault(id).unwrap().short_amount, Fixed::from_int(3));

        monitor
            .close_position(id, Fixed::from_int(3), &protocol, &pool)
            .unwrap();
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_settle_only_after_expiry() {
        let (mut monitor, protocol, pool) = setup();
        let s = series();
        let id = monitor
            .open_position(&s, Fixed::ONE, &protocol, &pool, Fixed::from_int(2000))
            .unwrap();

        assert!(monitor.settle_vault(id, &protocol, &pool, NOW).is_err());
        let closure = monitor.settle_vault(id, &protocol, &pool, s.expiration).unwrap();
        assert_eq!(closure.short_amount, Fixed::ONE);
        assert!(monitor.is_empty());
    }

    #[test]
    fn test_settled_collateral_parked_when_pool_refuses() {
        let (mut monitor, protocol, pool) = setup();
        let usdc = Asset::new("USDC");
        let s = series();
        let id = monitor
            .open_position(&s, Fixed::ONE, &protocol, &pool, Fixed::from_int(2000))
            .unwrap();
        assert_eq!(pool.available(&usdc), Fixed::from_int(97_400));

        pool.set_failing(true);
        let closure = monitor.settle_vault(id, &protocol, &pool, s.expiration).unwrap();
        assert_eq!(closure.returned, Fixed::from_int(2600));
        assert!(monitor.vault(id).is_none());
        assert_eq!(monitor.uncredited(&usdc), Fixed::from_int(2600));

        // Still refused: the amount stays parked
        assert!(monitor.retry_uncredited(&pool).is_err());
        assert_eq!(monitor.uncredited(&usdc), Fixed::from_int(2600));

        pool.set_failing(false);
        assert_eq!(monitor.retry_uncredited(&pool).unwrap(), Fixed::from_int(2600));
        assert_eq!(monitor.uncredited(&usdc), Fixed::ZERO);
        assert_eq!(pool.available(&usdc), Fixed::from_int(100_000));
    }

    #[test]
    fn test_swept_residual_parked_when_pool_refuses() {
        let (mut monitor, protocol, pool) = setup();
        let id = monitor
            .open_position(&series(), Fixed::from_int(2), &protocol, &pool, Fixed::from_int(2000))
            .unwrap();
        protocol.liquidate(id, Fixed::from_int(300));
        monitor.refresh_vault(id, &protocol).unwrap();

        pool.set_failing(true);
        let closure = monitor.sweep_liquidated_vault(id, &protocol, &pool).unwrap();
        assert_eq!(closure.returned, Fixed::from_int(300));
        assert!(monitor.vault(id).is_none());
        assert_eq!(monitor.uncredited(&Asset::new("USDC")), Fixed::from_int(300));
    }

    #[test]
    fn test_close_keeps_burn_when_pool_refuses() {
        let (mut monitor, protocol, pool) = setup();
        let spot = Fixed::from_int(2000);
        let id = monitor
            .open_position(&series(), Fixed::from_int(4), &protocol, &pool, spot)
            .unwrap();

        pool.set_failing(true);
        let released = monitor
            .close_position(id, Fixed::ONE, &protocol, &pool)
            .unwrap();
        assert_eq!(monitor.vault(id).unwrap().short_amount, Fixed::from_int(3));
        assert_eq!(protocol.vault_status(id).unwrap().short_amount, Fixed::from_int(3));
        assert_eq!(monitor.uncredited(&Asset::new("USDC")), released);
    }

    #[test]
    fn test_parked_credit_survives_restore() {
        let (mut monitor, protocol, pool) = setup();
        let s = series();
        let id = monitor
            .open_position(&s, Fixed::ONE, &protocol, &pool, Fixed::from_int(2000))
            .unwrap();
        pool.set_failing(true);
        monitor.settle_vault(id, &protocol, &pool, s.expiration).unwrap();

        let bytes = bincode::serialize(&monitor.state()).unwrap();
        let state: MonitorState = bincode::deserialize(&bytes).unwrap();
        let restored = CollateralHealthMonitor::from_state(state).unwrap();
        assert_eq!(restored.uncredited(&Asset::new("USDC")), Fixed::from_int(2600));
    }

    #[test]
    fn test_require_healthy_reports_breach() {
        let (mut monitor, protocol, pool) = setup();
        let spot = Fixed::from_int(2000);
        let id = monitor
            .open_position(&series(), Fixed::ONE, &protocol, &pool, spot)
            .unwrap();
        assert!(monitor.require_healthy(id, &protocol, spot).is_ok());

        monitor.set_posted(id, Fixed::from_int(1600));
        match monitor.require_healthy(id, &protocol, spot) {
            Err(crate::Error::HealthFactorBreach { health_factor, lower, .. }) => {
                assert_eq!(health_factor, 8_000);
                assert_eq!(lower, 12_000);
            }
            other => panic!("expected breach, got {:?}", other),
        }
    }

    #[test]
    fn test_state_round_trip() {
        let (mut monitor, protocol, pool) = setup();
        monitor
            .open_position(&series(), Fixed::ONE, &protocol, &pool, Fixed::from_int(2000))
            .unwrap();
        let state = monitor.state();
        let restored = CollateralHealthMonitor::from_state(state.clone()).unwrap();
        assert_eq!(restored.state(), state);
        assert!(restored.vault_for_series(&series().key()).is_some());
    }
}
