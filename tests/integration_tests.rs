//! Integration tests

use approx::assert_relative_eq;
use options_risk_engine::collateral::HealthStatus;
use options_risk_engine::hedging::{HedgeDispatcher, PerpReactor};
use options_risk_engine::market_data::Asset;
use options_risk_engine::pricing::{self, SkewCoefficients};
use options_risk_engine::risk::CompressedExposure;
use options_risk_engine::sim::{
    PaperCollateralPool, PaperMarginProtocol, PaperPerpVenue, PaperPriceOracle,
};
use options_risk_engine::*;
use proptest::prelude::*;
use std::sync::Arc;

const NOW: u64 = 1_700_000_000;
const DAY: u64 = 86_400;

struct Harness {
    engine: RiskEngine,
    oracle: Arc<PaperPriceOracle>,
    protocol: Arc<PaperMarginProtocol>,
    pool: Arc<PaperCollateralPool>,
    clock: Arc<FixedClock>,
    governor: AccountId,
    keeper: AccountId,
    lp: AccountId,
}

impl Harness {
    fn new(config: EngineConfig) -> Self {
        let oracle = Arc::new(PaperPriceOracle::new());
        oracle.set_price(&weth(), &usdc(), Fixed::from_int(2000), NOW);
        let pool = Arc::new(PaperCollateralPool::new());
        pool.set_balance(&usdc(), Fixed::from_int(1_000_000));
        let clock = Arc::new(FixedClock::new(NOW));
        let protocol = Arc::new(PaperMarginProtocol::new(10_000));

        let governor = AccountId::new("governor");
        let keeper = AccountId::new("keeper");
        let lp = AccountId::new("lp");
        let mut engine = RiskEngine::new(config, Self::collaborators(&oracle, &protocol, &pool, &clock), governor.clone())
            .unwrap();
        engine.grant_role(&governor, keeper.clone(), Role::Keeper).unwrap();
        engine.grant_role(&governor, lp.clone(), Role::Pool).unwrap();

        Self {
            engine,
            oracle,
            protocol,
            pool,
            clock,
            governor,
            keeper,
            lp,
        }
    }

    fn collaborators(
        oracle: &Arc<PaperPriceOracle>,
        protocol: &Arc<PaperMarginProtocol>,
        pool: &Arc<PaperCollateralPool>,
        clock: &Arc<FixedClock>,
    ) -> Collaborators {
        Collaborators {
            oracle: oracle.clone(),
            protocol: protocol.clone(),
            pool: pool.clone(),
            clock: clock.clone(),
        }
    }

    fn set_spot(&self, spot: i64) {
        self.oracle
            .set_price(&weth(), &usdc(), Fixed::from_int(spot), self.clock.now());
    }
}

fn weth() -> Asset {
    Asset::new("WETH")
}

fn usdc() -> Asset {
    Asset::new("USDC")
}

fn series(strike: i64, days: u64, is_put: bool) -> OptionSeries {
    OptionSeries::new(
        NOW + days * DAY,
        Fixed::from_int(strike),
        is_put,
        weth(),
        usdc(),
        usdc(),
    )
}

#[test]
fn test_buy_quote_exceeds_sell_quote() {
    let h = Harness::new(EngineConfig::default());
    for is_put in [false, true] {
        let s = series(2100, 30, is_put);
        let buy = h.engine.quote(&s, Fixed::ONE, false).unwrap();
        let sell = h.engine.quote(&s, Fixed::ONE, true).unwrap();

        assert!(buy.premium > buy.fees.base);
        assert!(sell.premium < sell.fees.base);
        assert!(buy.premium > sell.premium);
    }
}

#[test]
fn test_larger_buys_cost_more_per_contract() {
    let h = Harness::new(EngineConfig::default());
    let s = series(2200, 21, false);
    let one = h.engine.quote(&s, Fixed::ONE, false).unwrap();
    let ten = h.engine.quote(&s, Fixed::from_int(10), false).unwrap();

    assert!(ten.premium > one.premium);
    assert!(ten.unit_premium() > one.unit_premium());
}

#[test]
fn test_skew_changes_quotes() {
    let mut h = Harness::new(EngineConfig::default());
    let s = series(2100, 30, false);
    let before = h.engine.quote(&s, Fixed::ONE, false).unwrap();

    h.engine
        .set_volatility_skew(&h.governor, SkewCoefficients::flat(1.2), false)
        .unwrap();
    let after = h.engine.quote(&s, Fixed::ONE, false).unwrap();

    assert_relative_eq!(after.iv, 1.2, epsilon = 1e-6);
    assert!(after.premium > before.premium);
}

#[test]
fn test_trade_round_trip_returns_to_zero() {
    let mut h = Harness::new(EngineConfig::default());
    let s = series(2200, 14, false);

    h.engine.execute_trade(&h.lp, &s, Fixed::from_int(4), false).unwrap();
    assert_eq!(h.engine.tracker().net_exposure(&s), -Fixed::from_int(4));
    assert!(h.engine.options_delta().unwrap().is_negative());

    h.engine.execute_trade(&h.lp, &s, Fixed::from_int(4), true).unwrap();
    assert!(h.engine.tracker().net_exposure(&s).is_zero());
    assert!(h.engine.options_delta().unwrap().is_zero());
    assert!(h.engine.collateral().is_empty());
    assert_eq!(h.engine.metrics().trades_executed, 2);
}

#[test]
fn test_ledger_mode_matches_compressed_for_single_series() {
    let config = EngineConfig {
        tracker_mode: TrackerMode::Ledger,
        ..EngineConfig::default()
    };
    let mut ledger = Harness::new(config);
    let mut compressed = Harness::new(EngineConfig::default());
    let s = series(2400, 30, false);

    for h in [&mut ledger, &mut compressed] {
        h.engine.execute_trade(&h.lp, &s, Fixed::from_int(3), false).unwrap();
    }

    let a = ledger.engine.options_delta().unwrap().to_f64();
    let b = compressed.engine.options_delta().unwrap().to_f64();
    assert_relative_eq!(a, b, epsilon = 1e-6);
}

#[test]
fn test_collateral_adjustment_is_idempotent() {
    let mut h = Harness::new(EngineConfig::default());
    let s = series(2200, 14, false);
    let receipt = h.engine.execute_trade(&h.lp, &s, Fixed::ONE, false).unwrap();
    let vault = receipt.vault_id.unwrap();

    // Call margin tracks spot: 2600 posted against 2300 required
    h.set_spot(2300);
    let health = h.engine.scan_vaults().unwrap();
    assert_eq!(health[0].status, HealthStatus::NeedsTopUp);

    let first = h.engine.adjust_collateral(&h.keeper, vault).unwrap();
    assert!(first.moved.is_positive());
    assert_eq!(first.health_after, 13_000);

    let second = h.engine.adjust_collateral(&h.keeper, vault).unwrap();
    assert!(second.is_noop());
    assert_eq!(h.engine.metrics().collateral_adjustments, 1);
}

#[test]
fn test_hedge_split_across_reactors() {
    let mut dispatcher = HedgeDispatcher::new();

    let small = Arc::new(PaperPerpVenue::new(Fixed::from_int(2000)));
    small.set_max_position(Some(Fixed::from_int(15)));
    let mut first = PerpReactor::new("first", small.clone(), usdc(), 12_000).unwrap();
    first.deposit(Fixed::from_int(1_000_000));

    let large = Arc::new(PaperPerpVenue::new(Fixed::from_int(2000)));
    let mut second = PerpReactor::new("second", large.clone(), usdc(), 12_000).unwrap();
    second.deposit(Fixed::from_int(1_000_000));

    dispatcher.register(Box::new(first)).unwrap();
    dispatcher.register(Box::new(second)).unwrap();

    let report = dispatcher.rebalance(Fixed::from_int(20));
    assert_eq!(report.realized, Fixed::from_int(20));
    assert_eq!(report.fills[0].realized, Fixed::from_int(15));
    assert_eq!(report.fills[1].realized, Fixed::from_int(5));
    assert!(report.is_complete());
    assert_eq!(dispatcher.reactor_delta(), Fixed::from_int(20));
}

#[test]
fn test_engine_hedges_option_delta() {
    let mut h = Harness::new(EngineConfig::default());
    let venue = Arc::new(PaperPerpVenue::new(Fixed::from_int(2000)));
    let mut reactor = PerpReactor::new("perp", venue, usdc(), 12_000).unwrap();
    reactor.deposit(Fixed::from_int(1_000_000));
    h.engine.register_reactor(&h.governor, Box::new(reactor)).unwrap();

    h.engine
        .execute_trade(&h.lp, &series(2000, 30, false), Fixed::from_int(10), false)
        .unwrap();
    let options_delta = h.engine.options_delta().unwrap();
    assert!(options_delta < Fixed::from_int(-1));

    let report = h.engine.hedge_portfolio(&h.keeper).unwrap().unwrap();
    assert_eq!(report.realized, -options_delta);
    assert!(h.engine.portfolio_delta().unwrap().abs() <= Fixed::from_f64(0.01));
    assert!(h.engine.hedge_portfolio(&h.keeper).unwrap().is_none());
}

#[test]
fn test_unhedgeable_target_reports_shortfall() {
    let mut h = Harness::new(EngineConfig::default());
    let manager = AccountId::new("manager");
    h.engine
        .grant_role(&h.governor, manager.clone(), Role::Manager)
        .unwrap();

    let result = h.engine.rebalance(&manager, Fixed::from_int(5));
    assert!(matches!(
        result,
        Err(Error::InsufficientLiquidity { .. })
    ));
    assert_eq!(h.engine.metrics().hedge_shortfalls, 1);
}

#[test]
fn test_roles_are_enforced() {
    let mut h = Harness::new(EngineConfig::default());
    let s = series(2200, 14, false);

    assert!(matches!(
        h.engine.execute_trade(&h.keeper, &s, Fixed::ONE, false),
        Err(Error::UnauthorizedCaller { required: Role::Pool, .. })
    ));
    assert!(matches!(
        h.engine.rebalance(&h.keeper, Fixed::ONE),
        Err(Error::UnauthorizedCaller { required: Role::Manager, .. })
    ));
    assert!(matches!(
        h.engine.set_bid_ask_spread(&h.lp, 10),
        Err(Error::UnauthorizedCaller { .. })
    ));
}

#[test]
fn test_stale_oracle_rejects_trades() {
    let mut h = Harness::new(EngineConfig::default());
    h.clock.advance(2 * 3_600);

    let result = h.engine.execute_trade(&h.lp, &series(2200, 14, false), Fixed::ONE, false);
    assert!(matches!(result, Err(Error::StaleOracle(_))));
    assert!(result.unwrap_err().is_retryable());
    assert!(h.engine.collateral().is_empty());
}

#[test]
fn test_trade_without_pool_liquidity_leaves_no_trace() {
    let mut h = Harness::new(EngineConfig::default());
    h.pool.set_balance(&usdc(), Fixed::from_int(100));
    let s = series(2200, 14, false);

    let result = h.engine.execute_trade(&h.lp, &s, Fixed::ONE, false);
    assert!(matches!(result, Err(Error::InsufficientLiquidity { .. })));
    assert!(h.engine.tracker().net_exposure(&s).is_zero());
    assert!(h.engine.collateral().is_empty());
    assert_eq!(h.pool.available(&usdc()), Fixed::from_int(100));
}

#[test]
fn test_expired_inventory_redeemed_and_booked_out() {
    for mode in [TrackerMode::Compressed, TrackerMode::Ledger] {
        let mut h = Harness::new(EngineConfig {
            tracker_mode: mode,
            ..EngineConfig::default()
        });
        let s = series(1800, 30, false);
        h.engine.execute_trade(&h.lp, &s, Fixed::from_int(5), true).unwrap();
        assert_eq!(h.engine.inventory(&s), Fixed::from_int(5));

        h.clock.advance(31 * DAY);
        h.set_spot(2000);
        h.protocol.set_settlement_price(Some(Fixed::from_int(2000)));

        // Expired but unsettled longs carry intrinsic delta in both modes
        assert_eq!(h.engine.options_delta().unwrap(), Fixed::from_int(5));

        let before = h.pool.available(&usdc());
        let settled = h.engine.settle_expired_inventory(&h.keeper).unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].amount, Fixed::from_int(5));
        assert_eq!(settled[0].payout, Fixed::from_int(1000));

        assert!(h.engine.inventory(&s).is_zero());
        assert!(h.engine.tracker().side_exposure(OptionSide::Call).is_zero());
        assert!(h.engine.options_delta().unwrap().is_zero());
        assert_eq!(h.pool.available(&usdc()), before + Fixed::from_int(1000));
        assert!(h.engine.settle_expired_inventory(&h.keeper).unwrap().is_empty());
    }
}

#[test]
fn test_failed_redemption_keeps_inventory() {
    let mut h = Harness::new(EngineConfig::default());
    let s = series(1800, 30, false);
    h.engine.execute_trade(&h.lp, &s, Fixed::from_int(2), true).unwrap();
    h.clock.advance(31 * DAY);
    h.set_spot(2000);

    h.protocol.set_failing(true);
    assert!(matches!(
        h.engine.settle_expired_inventory(&h.keeper),
        Err(Error::Venue(_))
    ));
    assert_eq!(h.engine.inventory(&s), Fixed::from_int(2));
    assert_eq!(h.engine.tracker().net_exposure(&s), Fixed::from_int(2));
}

#[test]
fn test_unexpired_inventory_is_not_redeemed() {
    let mut h = Harness::new(EngineConfig::default());
    let s = series(1800, 30, false);
    h.engine.execute_trade(&h.lp, &s, Fixed::ONE, true).unwrap();

    assert!(h.engine.settle_expired_inventory(&h.keeper).unwrap().is_empty());
    assert_eq!(h.engine.inventory(&s), Fixed::ONE);
    assert!(matches!(
        h.engine.settle_expired_inventory(&h.lp),
        Err(Error::UnauthorizedCaller { required: Role::Keeper, .. })
    ));
}

#[test]
fn test_settlement_books_out_exposure_when_pool_refuses_credit() {
    let mut h = Harness::new(EngineConfig::default());
    let s = series(2200, 14, false);
    let vault = h
        .engine
        .execute_trade(&h.lp, &s, Fixed::from_int(2), false)
        .unwrap()
        .vault_id
        .unwrap();

    h.clock.advance(15 * DAY);
    h.pool.set_failing(true);
    let closure = h.engine.settle_vault(&h.keeper, vault).unwrap();
    assert!(closure.returned.is_positive());

    assert!(h.engine.collateral().vault(vault).is_none());
    assert!(h.engine.tracker().net_exposure(&s).is_zero());
    assert_eq!(h.engine.collateral().uncredited(&usdc()), closure.returned);

    h.pool.set_failing(false);
    let before = h.pool.available(&usdc());
    assert_eq!(h.engine.retry_uncredited(&h.keeper).unwrap(), closure.returned);
    assert_eq!(h.pool.available(&usdc()), before + closure.returned);
    assert!(h.engine.collateral().uncredited(&usdc()).is_zero());
}

#[test]
fn test_swept_vault_books_out_exposure_when_pool_refuses_credit() {
    let mut h = Harness::new(EngineConfig::default());
    let s = series(2200, 14, false);
    let vault = h
        .engine
        .execute_trade(&h.lp, &s, Fixed::from_int(3), false)
        .unwrap()
        .vault_id
        .unwrap();

    h.protocol.liquidate(vault, Fixed::from_int(500));
    assert_eq!(h.engine.refresh_vaults(&h.keeper).unwrap(), vec![vault]);

    h.pool.set_failing(true);
    h.engine.sweep_liquidated_vault(&h.keeper, vault).unwrap();
    assert!(h.engine.tracker().net_exposure(&s).is_zero());
    assert_eq!(h.engine.collateral().uncredited(&usdc()), Fixed::from_int(500));
}

#[test]
fn test_inventory_of_other_series_does_not_waive_collateral_cost() {
    let mut h = Harness::new(EngineConfig::default());
    h.engine
        .execute_trade(&h.lp, &series(1800, 30, false), Fixed::from_int(10), true)
        .unwrap();
    assert_eq!(
        h.engine.tracker().side_exposure(OptionSide::Call),
        Fixed::from_int(10)
    );

    let quote = h
        .engine
        .quote(&series(2400, 30, false), Fixed::from_int(5), false)
        .unwrap();
    assert!(quote.fees.collateral_cost.is_positive());

    // Delivering from inventory of the same series needs no new collateral
    let covered = h
        .engine
        .quote(&series(1800, 30, false), Fixed::from_int(5), false)
        .unwrap();
    assert!(covered.fees.collateral_cost.is_zero());
}

#[test]
fn test_adjust_all_vaults_only_touches_unhealthy() {
    let mut h = Harness::new(EngineConfig::default());
    let call_vault = h
        .engine
        .execute_trade(&h.lp, &series(2200, 14, false), Fixed::ONE, false)
        .unwrap()
        .vault_id
        .unwrap();
    h.engine
        .execute_trade(&h.lp, &series(1800, 14, true), Fixed::ONE, false)
        .unwrap();

    // Call margin follows spot; put margin is the strike
    h.set_spot(2300);
    let outcomes = h.engine.adjust_all_vaults(&h.keeper).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].0, call_vault);
    let adjustment = outcomes[0].1.as_ref().unwrap();
    assert_eq!(adjustment.status_before, HealthStatus::NeedsTopUp);
    assert!(adjustment.moved.is_positive());

    assert!(h.engine.adjust_all_vaults(&h.keeper).unwrap().is_empty());
    assert!(
        h.engine
            .scan_vaults()
            .unwrap()
            .iter()
            .all(|health| health.status == HealthStatus::Healthy)
    );
}

#[test]
fn test_fund_reactor_moves_pool_collateral() {
    let mut h = Harness::new(EngineConfig::default());
    let venue = Arc::new(PaperPerpVenue::new(Fixed::from_int(2000)));
    let reactor = PerpReactor::new("perp", venue, usdc(), 12_000).unwrap();
    h.engine.register_reactor(&h.governor, Box::new(reactor)).unwrap();

    h.engine
        .fund_reactor(&h.governor, "perp", Fixed::from_int(50_000))
        .unwrap();
    assert_eq!(h.pool.available(&usdc()), Fixed::from_int(950_000));
    assert_eq!(h.engine.reactor_value().unwrap(), Fixed::from_int(50_000));

    assert!(matches!(
        h.engine.fund_reactor(&h.governor, "perp", Fixed::from_int(2_000_000)),
        Err(Error::InsufficientLiquidity { .. })
    ));
    assert!(matches!(
        h.engine.fund_reactor(&h.governor, "missing", Fixed::ONE),
        Err(Error::ConfigInvalid(_))
    ));
    assert!(matches!(
        h.engine.fund_reactor(&h.keeper, "perp", Fixed::ONE),
        Err(Error::UnauthorizedCaller { required: Role::Manager, .. })
    ));
    assert_eq!(h.pool.available(&usdc()), Fixed::from_int(950_000));
}

#[test]
fn test_snapshot_restore_via_bincode() {
    let mut h = Harness::new(EngineConfig::default());
    let call = series(2200, 14, false);
    let put = series(1800, 30, true);
    h.engine.execute_trade(&h.lp, &call, Fixed::from_int(3), false).unwrap();
    h.engine.execute_trade(&h.lp, &put, Fixed::from_int(2), true).unwrap();

    let state = h.engine.snapshot();
    let bytes = state.to_bytes().unwrap();
    let decoded = EngineState::from_bytes(&bytes).unwrap();
    assert_eq!(decoded, state);

    let restored = RiskEngine::restore(
        decoded,
        Harness::collaborators(&h.oracle, &h.protocol, &h.pool, &h.clock),
        Vec::new(),
    )
    .unwrap();

    assert_eq!(restored.tracker().net_exposure(&call), -Fixed::from_int(3));
    assert_eq!(restored.inventory(&put), Fixed::from_int(2));
    assert_eq!(restored.collateral().len(), 1);
    assert!(restored.access().has_role(&h.lp, Role::Pool));
    assert_relative_eq!(
        restored.options_delta().unwrap().to_f64(),
        h.engine.options_delta().unwrap().to_f64(),
        epsilon = 1e-6
    );
}

#[test]
fn test_snapshot_json_round_trip() {
    let mut h = Harness::new(EngineConfig::default());
    h.engine
        .execute_trade(&h.lp, &series(2200, 14, false), Fixed::ONE, false)
        .unwrap();

    let state = h.engine.snapshot();
    let json = state.to_json().unwrap();
    assert_eq!(EngineState::from_json(&json).unwrap(), state);
}

proptest! {
    #[test]
    fn prop_put_call_parity(
        spot in 100.0f64..5_000.0,
        moneyness in 0.5f64..2.0,
        t in 0.01f64..2.0,
        iv in 0.1f64..2.0,
        rfr in 0.0f64..0.1,
    ) {
        let strike = spot * moneyness;
        let call = pricing::price(spot, strike, t, iv, rfr, false);
        let put = pricing::price(spot, strike, t, iv, rfr, true);
        let forward = spot - strike * (-rfr * t).exp();

        prop_assert!((call.price - put.price - forward).abs() < 1e-6 * spot.max(strike));
        prop_assert!((call.delta - put.delta - 1.0).abs() < 1e-9);
    }

    #[test]
    fn prop_aggregate_strike_within_recorded_range(
        trades in prop::collection::vec((1i64..100, 1_000i64..3_000, 1u64..365), 1..20)
    ) {
        let mut exposure = CompressedExposure::new();
        for &(amount, strike, days) in &trades {
            exposure
                .record(OptionSide::Call, -Fixed::from_int(amount), Fixed::from_int(strike), NOW + days * DAY)
                .unwrap();
        }

        let aggregate = exposure.aggregate(OptionSide::Call);
        let min_strike = trades.iter().map(|t| t.1).min().unwrap();
        let max_strike = trades.iter().map(|t| t.1).max().unwrap();
        let min_expiry = NOW + trades.iter().map(|t| t.2).min().unwrap() * DAY;
        let max_expiry = NOW + trades.iter().map(|t| t.2).max().unwrap() * DAY;
        let total: i64 = trades.iter().map(|t| t.0).sum();

        prop_assert_eq!(aggregate.total_amount, -Fixed::from_int(total));
        prop_assert!(aggregate.weighted_strike >= Fixed::from_int(min_strike));
        prop_assert!(aggregate.weighted_strike <= Fixed::from_int(max_strike));
        prop_assert!(aggregate.weighted_expiration >= min_expiry);
        prop_assert!(aggregate.weighted_expiration <= max_expiry);
    }

    #[test]
    fn prop_sequential_fills_match_single_fill(
        booked in 1i64..20,
        strike in 1_600i64..2_600,
        days in 7u64..120,
        is_put in any::<bool>(),
    ) {
        let s = series(strike, days, is_put);

        let mut stepwise = Harness::new(EngineConfig::default());
        let first = stepwise
            .engine
            .execute_trade(&stepwise.lp, &s, Fixed::from_int(booked), false)
            .unwrap()
            .quote;
        let next = stepwise.engine.quote(&s, Fixed::ONE, false).unwrap();

        let direct = Harness::new(EngineConfig::default());
        let whole = direct
            .engine
            .quote(&s, Fixed::from_int(booked + 1), false)
            .unwrap();

        let split = (first.premium + next.premium).to_f64();
        let single = whole.premium.to_f64();
        prop_assert!((split - single).abs() <= 1e-6 * single.max(1.0));

        // Exposure only grows, so the last contract is the dearest
        prop_assert!(next.premium >= whole.unit_premium());
    }

    #[test]
    fn prop_buy_sell_gap_covers_spread(
        strike in 1_600i64..2_600,
        days in 7u64..120,
        amount in 1i64..25,
        is_put in any::<bool>(),
        spread_bps in 0u32..500,
        prior in 0i64..10,
    ) {
        let mut h = Harness::new(EngineConfig::default());
        h.engine.set_bid_ask_spread(&h.governor, spread_bps).unwrap();
        let s = series(strike, days, is_put);
        if prior > 0 {
            h.engine.execute_trade(&h.lp, &s, Fixed::from_int(prior), false).unwrap();
        }

        let buy = h.engine.quote(&s, Fixed::from_int(amount), false).unwrap();
        let sell = h.engine.quote(&s, Fixed::from_int(amount), true).unwrap();
        let min_gap = buy.fees.base.bps(spread_bps);

        prop_assert_eq!(buy.fees.base, sell.fees.base);
        prop_assert!(buy.premium - sell.premium >= min_gap);
    }

    #[test]
    fn prop_buy_premium_monotone_in_amount(small in 1i64..20, extra in 1i64..20) {
        let h = Harness::new(EngineConfig::default());
        let s = series(2100, 30, false);
        let a = h.engine.quote(&s, Fixed::from_int(small), false).unwrap();
        let b = h.engine.quote(&s, Fixed::from_int(small + extra), false).unwrap();
        prop_assert!(b.premium > a.premium);
    }
}
