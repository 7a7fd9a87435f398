//! The risk engine: one owned state object tying every component together

mod access;
mod config;
mod guard;
mod state;

pub use access::{AccessControl, AccountId, Role};
pub use config::EngineConfig;
pub use guard::ReentrancyGuard;
pub use state::{EngineState, STATE_VERSION};

use crate::collateral::{
    CollateralAdjustment, CollateralHealthMonitor, CollateralPool, HealthBounds, HealthStatus,
    MarginProtocol, VaultClosure, VaultHealth, VaultId, VaultState,
};
use crate::hedging::{HedgeRecommendation, HedgeReport, HedgingConfig, HedgeDispatcher, HedgingReactor};
use crate::market_data::{OptionSeries, OptionSide, OracleGuard, PriceOracle, SeriesBounds, SeriesKey};
use crate::pricing::{SabrExpiry, SkewBasis, SkewCoefficients, VolatilityModel};
use crate::quoting::{DeltaBorrowRates, PricingParams, Quote, QuoteEngine, QuoteInputs};
use crate::risk::{DeltaContext, LedgerEntry, RiskTracker, TrackerState};
use crate::utils::{Clock, EngineMetrics, Fixed, MetricsSummary, get_timestamp_ns};
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// External systems the engine talks to
#[derive(Clone)]
pub struct Collaborators {
    pub oracle: Arc<dyn PriceOracle>,
    pub protocol: Arc<dyn MarginProtocol>,
    pub pool: Arc<dyn CollateralPool>,
    pub clock: Arc<dyn Clock>,
}

/// What a booked trade did
#[derive(Debug, Clone, PartialEq)]
pub struct TradeReceipt {
    pub quote: Quote,

    /// Vault the newly written contracts live in
    pub vault_id: Option<VaultId>,

    /// Contracts newly written (user buys beyond inventory)
    pub written: Fixed,

    /// Contracts delivered out of the pool's long inventory
    pub from_inventory: Fixed,

    /// Short contracts bought back (user sells against an open vault)
    pub bought_back: Fixed,

    /// Contracts added to the pool's long inventory
    pub to_inventory: Fixed,
}

/// Expired long inventory redeemed at the protocol
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySettlement {
    pub series: OptionSeries,
    pub amount: Fixed,

    /// Cash settlement received, in collateral
    pub payout: Fixed,
}

/// Options pool risk engine
///
/// Every state-changing operation takes `&mut self`, checks the caller's
/// role, validates, applies its own effects and only then calls out to
/// external systems, undoing its effects if a call fails.
pub struct RiskEngine {
    config: EngineConfig,
    volatility: VolatilityModel,
    quotes: QuoteEngine,
    oracle_guard: OracleGuard,
    tracker: Box<dyn RiskTracker>,
    collateral: CollateralHealthMonitor,
    hedging: HedgeDispatcher,
    inventory: BTreeMap<SeriesKey, Fixed>,
    access: AccessControl,
    guard: ReentrancyGuard,
    metrics: RwLock<EngineMetrics>,
    collaborators: Collaborators,
}

impl RiskEngine {
    /// Create an engine with empty books and `governor` as its only role holder
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
        governor: AccountId,
    ) -> crate::Result<Self> {
        config.validate()?;
        info!(
            "risk engine for {}/{} ({:?} tracker)",
            config.underlying, config.strike_asset, config.tracker_mode
        );

        Ok(Self {
            volatility: config.volatility.clone(),
            quotes: QuoteEngine::new(config.pricing.clone())?,
            oracle_guard: OracleGuard::new(config.oracle.clone()),
            tracker: TrackerState::empty(config.tracker_mode).into_tracker(),
            collateral: CollateralHealthMonitor::new(config.health_bounds)?,
            hedging: HedgeDispatcher::new(),
            inventory: BTreeMap::new(),
            access: AccessControl::with_governor(governor),
            guard: ReentrancyGuard::new(),
            metrics: RwLock::new(EngineMetrics::new()),
            config,
            collaborators,
        })
    }

    /// Rebuild an engine from persisted state
    ///
    /// `reactors` are registered and then ordered and flagged as persisted.
    pub fn restore(
        state: EngineState,
        collaborators: Collaborators,
        reactors: Vec<Box<dyn HedgingReactor>>,
    ) -> crate::Result<Self> {
        state.config.validate()?;
        if state.tracker.mode() != state.config.tracker_mode {
            warn!(
                "persisted tracker is {:?} but config asks for {:?}; keeping persisted",
                state.tracker.mode(),
                state.config.tracker_mode
            );
        }

        let mut hedging = HedgeDispatcher::new();
        for reactor in reactors {
            hedging.register(reactor)?;
        }
        hedging.apply_registrations(&state.reactors);

        let inventory = state
            .inventory
            .into_iter()
            .filter(|entry| entry.amount.is_positive())
            .map(|entry| (entry.series, entry.amount))
            .collect();

        Ok(Self {
            volatility: state.volatility,
            quotes: QuoteEngine::new(state.config.pricing.clone())?,
            oracle_guard: OracleGuard::new(state.config.oracle.clone()),
            tracker: state.tracker.into_tracker(),
            collateral: CollateralHealthMonitor::from_state(state.collateral)?,
            hedging,
            inventory,
            access: state.access,
            guard: ReentrancyGuard::new(),
            metrics: RwLock::new(EngineMetrics::new()),
            config: state.config,
            collaborators,
        })
    }

    /// Persistable copy of the engine's state
    pub fn snapshot(&self) -> EngineState {
        EngineState {
            version: STATE_VERSION,
            config: self.config.clone(),
            volatility: self.volatility.clone(),
            tracker: self.tracker.snapshot(),
            collateral: self.collateral.state(),
            inventory: self
                .inventory
                .iter()
                .map(|(series, amount)| LedgerEntry {
                    series: *series,
                    amount: *amount,
                })
                .collect(),
            reactors: self.hedging.registrations(),
            access: self.access.clone(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn volatility(&self) -> &VolatilityModel {
        &self.volatility
    }

    pub fn tracker(&self) -> &dyn RiskTracker {
        self.tracker.as_ref()
    }

    pub fn collateral(&self) -> &CollateralHealthMonitor {
        &self.collateral
    }

    pub fn hedging(&self) -> &HedgeDispatcher {
        &self.hedging
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Long inventory held for `series`
    pub fn inventory(&self, series: &OptionSeries) -> Fixed {
        self.inventory.get(&series.key()).copied().unwrap_or(Fixed::ZERO)
    }

    pub fn metrics(&self) -> MetricsSummary {
        self.metrics.read().summary()
    }

    pub fn now(&self) -> u64 {
        self.collaborators.clock.now()
    }

    /// Oracle spot for the underlying, rejected if stale
    pub fn spot(&self) -> crate::Result<Fixed> {
        self.oracle_guard.checked_price(
            self.collaborators.oracle.as_ref(),
            &self.config.underlying,
            &self.config.strike_asset,
            self.now(),
        )
    }

    // ---------------------------------------------------------------
    // Quoting and trading
    // ---------------------------------------------------------------

    /// Premium for a user buying (`is_sell == false`) or selling `amount`
    pub fn quote(&self, series: &OptionSeries, amount: Fixed, is_sell: bool) -> crate::Result<Quote> {
        let start_ns = get_timestamp_ns();
        let result = self.compute_quote(series, amount, is_sell);

        let mut metrics = self.metrics.write();
        match &result {
            Ok(_) => metrics.record_quote(get_timestamp_ns().saturating_sub(start_ns)),
            Err(_) => metrics.record_rejected_quote(),
        }
        result
    }

    fn compute_quote(&self, series: &OptionSeries, amount: Fixed, is_sell: bool) -> crate::Result<Quote> {
        self.check_assets(series)?;
        let now = self.now();
        let spot = self.spot()?;
        let margin_per_contract = if is_sell {
            Fixed::ZERO
        } else {
            self.collaborators
                .protocol
                .naked_margin_required(series, Fixed::ONE, spot)?
        };

        let inputs = QuoteInputs {
            series,
            amount,
            is_sell,
            spot,
            now,
            risk_free_rate: self.config.risk_free_rate,
            net_exposure: self.tracker.net_exposure(series),
            covered_inventory: self.inventory(series),
            margin_per_contract,
        };
        self.quotes.quote(&inputs, &self.volatility)
    }

    /// Book a trade between a user and the pool
    ///
    /// A user buy is filled from the pool's long inventory first and written
    /// through a collateralised vault for the rest. A user sell buys back open
    /// shorts first and adds the rest to inventory.
    pub fn execute_trade(
        &mut self,
        caller: &AccountId,
        series: &OptionSeries,
        amount: Fixed,
        is_sell: bool,
    ) -> crate::Result<TradeReceipt> {
        self.access.require(caller, Role::Pool)?;
        self.guarded("execute_trade", |engine| {
            engine.book_trade(series, amount, is_sell)
        })
    }

    fn book_trade(&mut self, series: &OptionSeries, amount: Fixed, is_sell: bool) -> crate::Result<TradeReceipt> {
        let quote = self.quote(series, amount, is_sell)?;
        let now = self.now();
        let spot = quote.spot;
        let key = series.key();
        let asset = self.config.collateral_asset.clone();
        let protocol = Arc::clone(&self.collaborators.protocol);
        let pool = Arc::clone(&self.collaborators.pool);

        let held = self.inventory.get(&key).copied().unwrap_or(Fixed::ZERO);
        let mut receipt = TradeReceipt {
            quote,
            vault_id: None,
            written: Fixed::ZERO,
            from_inventory: Fixed::ZERO,
            bought_back: Fixed::ZERO,
            to_inventory: Fixed::ZERO,
        };

        if is_sell {
            let premium = receipt.quote.premium;
            let available = pool.available(&asset);
            if available < premium {
                return Err(crate::Error::InsufficientLiquidity {
                    requested: premium,
                    available,
                });
            }

            let vault = self
                .collateral
                .vault_for_series(&key)
                .filter(|v| v.state == VaultState::Active)
                .map(|v| (v.id, v.short_amount));
            receipt.bought_back = vault.map_or(Fixed::ZERO, |(_, short)| short.min(amount));
            receipt.to_inventory = amount - receipt.bought_back;
            receipt.vault_id = vault.map(|(id, _)| id);

            // Effects
            self.tracker.record_trade(series, amount)?;
            self.set_inventory(key, held + receipt.to_inventory);

            // Interactions. A close that returns an error has left the vault
            // untouched; once it succeeds the books stay as booked.
            if let Err(e) = pool.debit(&asset, premium) {
                self.undo_trade(series, amount, key, held);
                return Err(e);
            }
            if let Some(id) = receipt.vault_id.filter(|_| receipt.bought_back.is_positive()) {
                if let Err(e) = self.collateral.close_position(id, receipt.bought_back, protocol.as_ref(), pool.as_ref()) {
                    self.collateral.credit_or_park(pool.as_ref(), &asset, premium);
                    self.undo_trade(series, amount, key, held);
                    return Err(e);
                }
            }
        } else {
            receipt.from_inventory = held.min(amount);
            receipt.written = amount - receipt.from_inventory;
            if receipt.written.is_positive() {
                self.config.series_bounds.check(series, now)?;
            }

            // Effects
            self.tracker.record_trade(series, -amount)?;
            self.set_inventory(key, held - receipt.from_inventory);

            // Interactions
            if receipt.written.is_positive() {
                match self.collateral.open_position(series, receipt.written, protocol.as_ref(), pool.as_ref(), spot) {
                    Ok(id) => receipt.vault_id = Some(id),
                    Err(e) => {
                        self.undo_trade(series, -amount, key, held);
                        return Err(e);
                    }
                }
            }
            if let Err(e) = pool.credit(&asset, receipt.quote.premium) {
                let mut unwound = true;
                if let Some(id) = receipt.vault_id {
                    if let Err(unwind) = self.collateral.close_position(id, receipt.written, protocol.as_ref(), pool.as_ref()) {
                        warn!("vault {}: could not unwind written contracts: {}", id, unwind);
                        unwound = false;
                    }
                }
                // Written contracts that could not be burned stay on the books
                let reverted = if unwound { amount } else { receipt.from_inventory };
                self.undo_trade(series, -reverted, key, held);
                return Err(e);
            }
        }

        self.metrics.write().record_trade();
        info!("{}", receipt.quote);
        Ok(receipt)
    }

    fn undo_trade(&mut self, series: &OptionSeries, amount: Fixed, key: SeriesKey, held: Fixed) {
        if let Err(e) = self.tracker.record_trade(series, -amount) {
            warn!("could not revert exposure for {}: {}", series, e);
        }
        self.set_inventory(key, held);
    }

    /// The pool's series for `key`
    fn series_for(&self, key: SeriesKey) -> OptionSeries {
        OptionSeries::new(
            key.expiration,
            key.strike,
            key.is_put,
            self.config.underlying.clone(),
            self.config.strike_asset.clone(),
            self.config.collateral_asset.clone(),
        )
    }

    fn set_inventory(&mut self, key: SeriesKey, amount: Fixed) {
        if amount.is_positive() {
            self.inventory.insert(key, amount);
        } else {
            self.inventory.remove(&key);
        }
    }

    fn check_assets(&self, series: &OptionSeries) -> crate::Result<()> {
        if series.underlying != self.config.underlying
            || series.strike_asset != self.config.strike_asset
            || series.collateral_asset != self.config.collateral_asset
        {
            return Err(crate::Error::BoundsViolation(format!(
                "series {} does not trade in this pool ({}/{}, collateral {})",
                series, self.config.underlying, self.config.strike_asset, self.config.collateral_asset
            )));
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Collateral
    // ---------------------------------------------------------------

    pub fn adjust_collateral(&mut self, caller: &AccountId, vault: VaultId) -> crate::Result<CollateralAdjustment> {
        self.access.require(caller, Role::Keeper)?;
        self.guarded("adjust_collateral", |engine| {
            let spot = engine.spot()?;
            let adjustment = engine.collateral.adjust_collateral(
                vault,
                engine.collaborators.protocol.as_ref(),
                engine.collaborators.pool.as_ref(),
                spot,
            )?;
            if !adjustment.is_noop() {
                engine.metrics.write().record_collateral_adjustment();
            }
            Ok(adjustment)
        })
    }

    /// Settle an expired vault; its short exposure leaves the books
    pub fn settle_vault(&mut self, caller: &AccountId, vault: VaultId) -> crate::Result<VaultClosure> {
        self.access.require(caller, Role::Keeper)?;
        self.guarded("settle_vault", |engine| {
            let now = engine.now();
            let closure = engine.collateral.settle_vault(
                vault,
                engine.collaborators.protocol.as_ref(),
                engine.collaborators.pool.as_ref(),
                now,
            )?;
            engine.tracker.record_trade(&closure.series, closure.short_amount)?;
            Ok(closure)
        })
    }

    /// Reclaim a vault the protocol liquidated; its short exposure leaves the books
    pub fn sweep_liquidated_vault(&mut self, caller: &AccountId, vault: VaultId) -> crate::Result<VaultClosure> {
        self.access.require(caller, Role::Keeper)?;
        self.guarded("sweep_liquidated_vault", |engine| {
            let closure = engine.collateral.sweep_liquidated_vault(
                vault,
                engine.collaborators.protocol.as_ref(),
                engine.collaborators.pool.as_ref(),
            )?;
            engine.tracker.record_trade(&closure.series, closure.short_amount)?;
            Ok(closure)
        })
    }

    /// Adjust every active vault the scan finds outside its bounds
    ///
    /// One vault failing does not stop the others; each outcome is reported.
    pub fn adjust_all_vaults(
        &mut self,
        caller: &AccountId,
    ) -> crate::Result<Vec<(VaultId, crate::Result<CollateralAdjustment>)>> {
        self.access.require(caller, Role::Keeper)?;
        self.guarded("adjust_all_vaults", |engine| {
            let spot = engine.spot()?;
            let protocol = Arc::clone(&engine.collaborators.protocol);
            let pool = Arc::clone(&engine.collaborators.pool);

            let unhealthy: Vec<VaultId> = engine
                .collateral
                .scan(protocol.as_ref(), spot)?
                .into_iter()
                .filter(|health| health.status != HealthStatus::Healthy)
                .map(|health| health.vault_id)
                .filter(|id| engine.collateral.vault(*id).is_some_and(|v| v.is_active()))
                .collect();

            let mut outcomes = Vec::with_capacity(unhealthy.len());
            for id in unhealthy {
                let result = engine
                    .collateral
                    .adjust_collateral(id, protocol.as_ref(), pool.as_ref(), spot);
                match &result {
                    Ok(adjustment) if !adjustment.is_noop() => {
                        engine.metrics.write().record_collateral_adjustment();
                    }
                    Ok(_) => {}
                    Err(e) => warn!("vault {} adjustment failed: {}", id, e),
                }
                outcomes.push((id, result));
            }
            Ok(outcomes)
        })
    }

    /// Redeem every expired long in inventory; its exposure leaves the books
    ///
    /// Series settle one at a time in key order. A failed redemption stops the
    /// run and leaves that series, and every later one, in inventory.
    pub fn settle_expired_inventory(&mut self, caller: &AccountId) -> crate::Result<Vec<InventorySettlement>> {
        self.access.require(caller, Role::Keeper)?;
        self.guarded("settle_expired_inventory", |engine| {
            let now = engine.now();
            let expired: Vec<(SeriesKey, Fixed)> = engine
                .inventory
                .iter()
                .filter(|(key, _)| key.expiration <= now)
                .map(|(key, amount)| (*key, *amount))
                .collect();

            let mut settled = Vec::with_capacity(expired.len());
            for (key, amount) in expired {
                settled.push(engine.redeem_inventory(key, amount)?);
            }
            Ok(settled)
        })
    }

    fn redeem_inventory(&mut self, key: SeriesKey, amount: Fixed) -> crate::Result<InventorySettlement> {
        let series = self.series_for(key);

        // Effects
        self.tracker.record_trade(&series, -amount)?;
        self.set_inventory(key, Fixed::ZERO);

        // Interactions
        let payout = match self.collaborators.protocol.redeem_long(&series, amount) {
            Ok(payout) => payout,
            Err(e) => {
                self.undo_trade(&series, -amount, key, amount);
                return Err(e);
            }
        };
        let pool = Arc::clone(&self.collaborators.pool);
        self.collateral
            .credit_or_park(pool.as_ref(), &series.collateral_asset, payout);

        info!("redeemed {} expired {} for {}", amount, series, payout);
        Ok(InventorySettlement {
            series,
            amount,
            payout,
        })
    }

    /// Hand collateral a refused pool credit left parked back to the pool
    pub fn retry_uncredited(&mut self, caller: &AccountId) -> crate::Result<Fixed> {
        self.access.require(caller, Role::Keeper)?;
        self.guarded("retry_uncredited", |engine| {
            let pool = Arc::clone(&engine.collaborators.pool);
            engine.collateral.retry_uncredited(pool.as_ref())
        })
    }

    /// Health of every vault at the current spot
    pub fn scan_vaults(&self) -> crate::Result<Vec<VaultHealth>> {
        let spot = self.spot()?;
        self.collateral
            .scan(self.collaborators.protocol.as_ref(), spot)
    }

    /// `HealthFactorBreach` unless `vault` sits inside its bounds at the current spot
    pub fn require_healthy(&self, vault: VaultId) -> crate::Result<()> {
        let spot = self.spot()?;
        self.collateral
            .require_healthy(vault, self.collaborators.protocol.as_ref(), spot)
    }

    /// Pull liquidation flags from the protocol; returns newly liquidated vaults
    pub fn refresh_vaults(&mut self, caller: &AccountId) -> crate::Result<Vec<VaultId>> {
        self.access.require(caller, Role::Keeper)?;
        self.guarded("refresh_vaults", |engine| {
            let mut liquidated = Vec::new();
            for id in engine.collateral.vault_ids() {
                let was_active = engine.collateral.vault(id).is_some_and(|v| v.is_active());
                let state = engine
                    .collateral
                    .refresh_vault(id, engine.collaborators.protocol.as_ref())?;
                if was_active && state == VaultState::Liquidated {
                    liquidated.push(id);
                }
            }
            Ok(liquidated)
        })
    }

    // ---------------------------------------------------------------
    // Hedging
    // ---------------------------------------------------------------

    /// Delta of the option books plus everything held by the reactors
    pub fn portfolio_delta(&self) -> crate::Result<Fixed> {
        Ok(self.options_delta()? + self.hedging.reactor_delta())
    }

    /// Delta of the option books alone
    pub fn options_delta(&self) -> crate::Result<Fixed> {
        let ctx = DeltaContext {
            spot: self.spot()?,
            now: self.now(),
            risk_free_rate: self.config.risk_free_rate,
            volatility: &self.volatility,
        };
        self.tracker.portfolio_delta(&ctx)
    }

    /// Push `target` delta through the reactors
    ///
    /// Fills are kept even when the result is an error: a shortfall beyond
    /// the tolerance is reported as `InsufficientLiquidity` after the
    /// reactors have done what they could.
    pub fn rebalance(&mut self, caller: &AccountId, target: Fixed) -> crate::Result<HedgeReport> {
        self.access.require(caller, Role::Manager)?;
        self.guarded("rebalance", |engine| engine.dispatch(target))
    }

    fn dispatch(&mut self, target: Fixed) -> crate::Result<HedgeReport> {
        let report = self.hedging.rebalance(target);
        let shortfall = report.shortfall().abs() > self.config.hedging.shortfall_tolerance;
        self.metrics
            .write()
            .record_hedge(report.realized.abs().to_f64(), shortfall);

        if shortfall {
            warn!(
                "hedge shortfall: requested {} realized {}",
                report.target, report.realized
            );
            return Err(crate::Error::InsufficientLiquidity {
                requested: report.target,
                available: report.realized,
            });
        }
        Ok(report)
    }

    /// Recommendation for the current portfolio delta, `None` inside the threshold
    pub fn hedge_recommendation(&self) -> crate::Result<Option<HedgeRecommendation>> {
        Ok(self.config.hedging.recommend(self.portfolio_delta()?))
    }

    /// Keeper entry point: neutralise the portfolio delta once it leaves the threshold
    pub fn hedge_portfolio(&mut self, caller: &AccountId) -> crate::Result<Option<HedgeReport>> {
        self.access.require(caller, Role::Keeper)?;
        self.guarded("hedge_portfolio", |engine| {
            let Some(recommendation) = engine.hedge_recommendation()? else {
                return Ok(None);
            };
            info!("{} [{:?}]", recommendation.reason, recommendation.urgency);
            engine.dispatch(recommendation.target).map(Some)
        })
    }

    /// Re-sync every reactor's collateral
    pub fn update_reactors(&mut self, caller: &AccountId) -> crate::Result<Vec<(String, crate::Result<Fixed>)>> {
        self.access.require(caller, Role::Keeper)?;
        self.guarded("update_reactors", |engine| Ok(engine.hedging.update_all()))
    }

    /// Return up to `amount` of collateral from the reactors to the pool
    pub fn withdraw_from_reactors(&mut self, caller: &AccountId, amount: Fixed) -> crate::Result<Fixed> {
        self.access.require(caller, Role::Manager)?;
        self.guarded("withdraw_from_reactors", |engine| {
            let asset = engine.config.collateral_asset.clone();
            let released = engine.hedging.withdraw(amount, &asset);
            let pool = Arc::clone(&engine.collaborators.pool);
            engine.collateral.credit_or_park(pool.as_ref(), &asset, released);
            Ok(released)
        })
    }

    /// Move `amount` of pool collateral into the named reactor
    pub fn fund_reactor(&mut self, caller: &AccountId, name: &str, amount: Fixed) -> crate::Result<()> {
        self.access.require(caller, Role::Manager)?;
        self.guarded("fund_reactor", |engine| {
            if engine.hedging.reactor(name).is_none() {
                return Err(crate::Error::ConfigInvalid(format!("no reactor named {}", name)));
            }
            if !amount.is_positive() {
                return Err(crate::Error::BoundsViolation(format!(
                    "reactor funding must be positive, got {}",
                    amount
                )));
            }
            let asset = engine.config.collateral_asset.clone();
            let pool = Arc::clone(&engine.collaborators.pool);
            let available = pool.available(&asset);
            if available < amount {
                return Err(crate::Error::InsufficientLiquidity {
                    requested: amount,
                    available,
                });
            }

            pool.debit(&asset, amount)?;
            if let Err(e) = engine.hedging.fund(name, amount, &asset) {
                engine.collateral.credit_or_park(pool.as_ref(), &asset, amount);
                return Err(e);
            }
            Ok(())
        })
    }

    /// Value held across all reactors, in collateral
    pub fn reactor_value(&self) -> crate::Result<Fixed> {
        self.hedging.pool_denominated_value()
    }

    // ---------------------------------------------------------------
    // Governance
    // ---------------------------------------------------------------

    pub fn grant_role(&mut self, caller: &AccountId, account: AccountId, role: Role) -> crate::Result<()> {
        info!("{} grants {} to {}", caller, role, account);
        self.access.grant(caller, account, role)
    }

    pub fn revoke_role(&mut self, caller: &AccountId, account: &AccountId, role: Role) -> crate::Result<()> {
        info!("{} revokes {} from {}", caller, role, account);
        self.access.revoke(caller, account, role)
    }

    pub fn register_reactor(&mut self, caller: &AccountId, reactor: Box<dyn HedgingReactor>) -> crate::Result<()> {
        self.access.require(caller, Role::Governor)?;
        self.hedging.register(reactor)
    }

    pub fn remove_reactor(&mut self, caller: &AccountId, name: &str) -> crate::Result<Box<dyn HedgingReactor>> {
        self.access.require(caller, Role::Governor)?;
        self.hedging.remove(name)
    }

    pub fn set_reactor_enabled(&mut self, caller: &AccountId, name: &str, enabled: bool) -> crate::Result<()> {
        self.access.require(caller, Role::Governor)?;
        self.hedging.set_enabled(name, enabled)
    }

    pub fn reorder_reactors(&mut self, caller: &AccountId, order: &[String]) -> crate::Result<()> {
        self.access.require(caller, Role::Governor)?;
        self.hedging.reorder(order)
    }

    /// Replace one side's skew coefficients
    pub fn set_volatility_skew(
        &mut self,
        caller: &AccountId,
        coefficients: SkewCoefficients,
        is_put: bool,
    ) -> crate::Result<()> {
        self.access.require(caller, Role::Manager)?;
        match &mut self.volatility {
            VolatilityModel::Skew(surface) => {
                surface.set_volatility_skew(coefficients, is_put);
                info!("{} skew updated", OptionSide::from_is_put(is_put));
                Ok(())
            }
            VolatilityModel::Sabr(_) => Err(crate::Error::ConfigInvalid(
                "engine prices with SABR; skew coefficients do not apply".into(),
            )),
        }
    }

    pub fn set_skew_basis(&mut self, caller: &AccountId, basis: SkewBasis) -> crate::Result<()> {
        self.access.require(caller, Role::Governor)?;
        match &mut self.volatility {
            VolatilityModel::Skew(surface) => {
                surface.set_basis(basis);
                Ok(())
            }
            VolatilityModel::Sabr(_) => Err(crate::Error::ConfigInvalid(
                "engine prices with SABR; skew basis does not apply".into(),
            )),
        }
    }

    /// Install SABR parameters for one expiry
    pub fn set_sabr_expiry(&mut self, caller: &AccountId, expiration: u64, params: SabrExpiry) -> crate::Result<()> {
        self.access.require(caller, Role::Manager)?;
        match &mut self.volatility {
            VolatilityModel::Sabr(surface) => surface.set_expiry(expiration, params),
            VolatilityModel::Skew(_) => Err(crate::Error::ConfigInvalid(
                "engine prices with a skew polynomial; SABR parameters do not apply".into(),
            )),
        }
    }

    /// Switch volatility model wholesale
    pub fn set_volatility_model(&mut self, caller: &AccountId, model: VolatilityModel) -> crate::Result<()> {
        self.access.require(caller, Role::Governor)?;
        self.volatility = model;
        Ok(())
    }

    /// Replace all pricing parameters (bands, multipliers, spread, rates)
    pub fn set_pricing_params(&mut self, caller: &AccountId, params: PricingParams) -> crate::Result<()> {
        self.access.require(caller, Role::Governor)?;
        self.quotes.set_params(params.clone())?;
        self.config.pricing = params;
        Ok(())
    }

    pub fn set_bid_ask_spread(&mut self, caller: &AccountId, bps: u32) -> crate::Result<()> {
        self.access.require(caller, Role::Manager)?;
        self.update_pricing(|p| p.bid_ask_spread_bps = bps)
    }

    pub fn set_collateral_lending_rate(&mut self, caller: &AccountId, bps: u32) -> crate::Result<()> {
        self.access.require(caller, Role::Manager)?;
        self.update_pricing(|p| p.collateral_lending_rate_bps = bps)
    }

    pub fn set_delta_borrow_rates(&mut self, caller: &AccountId, rates: DeltaBorrowRates) -> crate::Result<()> {
        self.access.require(caller, Role::Manager)?;
        self.update_pricing(|p| p.delta_borrow_rates = rates)
    }

    pub fn set_slippage_gradient(&mut self, caller: &AccountId, gradient: Fixed) -> crate::Result<()> {
        self.access.require(caller, Role::Manager)?;
        self.update_pricing(|p| p.slippage_gradient = gradient)
    }

    pub fn set_health_bounds(&mut self, caller: &AccountId, side: OptionSide, bounds: HealthBounds) -> crate::Result<()> {
        self.access.require(caller, Role::Governor)?;
        self.collateral.set_bounds(side, bounds)?;
        match side {
            OptionSide::Call => self.config.health_bounds.call = bounds,
            OptionSide::Put => self.config.health_bounds.put = bounds,
        }
        Ok(())
    }

    pub fn set_series_bounds(&mut self, caller: &AccountId, bounds: SeriesBounds) -> crate::Result<()> {
        self.access.require(caller, Role::Governor)?;
        bounds.validate()?;
        self.config.series_bounds = bounds;
        Ok(())
    }

    pub fn set_hedging_config(&mut self, caller: &AccountId, hedging: HedgingConfig) -> crate::Result<()> {
        self.access.require(caller, Role::Governor)?;
        hedging.validate()?;
        self.config.hedging = hedging;
        Ok(())
    }

    fn update_pricing(&mut self, change: impl FnOnce(&mut PricingParams)) -> crate::Result<()> {
        let mut params = self.config.pricing.clone();
        change(&mut params);
        self.quotes.set_params(params.clone())?;
        self.config.pricing = params;
        Ok(())
    }

    /// Run `operation` with the reentrancy flag held
    fn guarded<T>(
        &mut self,
        name: &str,
        operation: impl FnOnce(&mut Self) -> crate::Result<T>,
    ) -> crate::Result<T> {
        self.guard.enter(name)?;
        let result = operation(self);
        self.guard.exit();
        result
    }
}
