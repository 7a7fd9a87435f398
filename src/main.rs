//! Options risk engine binary: runs a simulated trading session

use anyhow::Context;
use log::{info, warn};
use options_risk_engine::sim::{
    PaperCollateralPool, PaperMarginProtocol, PaperPerpVenue, PaperPriceOracle, PaperSwapVenue,
};
use options_risk_engine::*;
use std::sync::Arc;

const START: u64 = 1_700_000_000;
const DAY: u64 = 86_400;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    println!("╔════════════════════════════════════════════════╗");
    println!("║   Options Risk Engine v0.1.0                   ║");
    println!("╚════════════════════════════════════════════════╝\n");

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("loading engine config from {}", path))?,
        None => EngineConfig::default(),
    };

    let underlying = config.underlying.clone();
    let strike_asset = config.strike_asset.clone();
    let collateral_asset = config.collateral_asset.clone();
    let mut spot = Fixed::from_int(2000);

    let clock = Arc::new(FixedClock::new(START));
    let oracle = Arc::new(PaperPriceOracle::new());
    oracle.set_price(&underlying, &strike_asset, spot, START);
    let protocol = Arc::new(PaperMarginProtocol::new(2_000));
    protocol.set_spot(spot);
    let pool = Arc::new(PaperCollateralPool::new());
    pool.set_balance(&collateral_asset, Fixed::from_int(5_000_000));

    let governor = AccountId::new("governor");
    let keeper = AccountId::new("keeper");
    let liquidity_pool = AccountId::new("liquidity-pool");

    let mut engine = RiskEngine::new(
        config,
        Collaborators {
            oracle: oracle.clone(),
            protocol: protocol.clone(),
            pool: pool.clone(),
            clock: clock.clone(),
        },
        governor.clone(),
    )?;
    engine.grant_role(&governor, keeper.clone(), Role::Keeper)?;
    engine.grant_role(&governor, liquidity_pool.clone(), Role::Pool)?;

    let swap_venue = Arc::new(PaperSwapVenue::with_fee(spot, 5));
    let mut spot_reactor = SpotSwapReactor::new("uniswap", swap_venue.clone(), collateral_asset.clone());
    spot_reactor.deposit(Fixed::from_int(200_000));
    let perp_venue = Arc::new(PaperPerpVenue::new(spot));
    let mut perp_reactor = PerpReactor::new("perp", perp_venue.clone(), collateral_asset.clone(), 12_000)?;
    perp_reactor.deposit(Fixed::from_int(200_000));
    engine.register_reactor(&governor, Box::new(spot_reactor))?;
    engine.register_reactor(&governor, Box::new(perp_reactor))?;
    engine.fund_reactor(&governor, "perp", Fixed::from_int(100_000))?;

    println!("✓ Engine initialized");
    println!("  Underlying:  {}/{}", underlying, strike_asset);
    println!("  Collateral:  {}", collateral_asset);
    println!("  Pool funds:  {}", pool.available(&collateral_asset));
    println!("\nSimulating trading session...\n");

    let strikes = [1800, 1900, 2000, 2100, 2200, 2400];
    for step in 0..60u64 {
        // Deterministic spot path
        let drift = ((step % 12) as i64 - 6) * 3;
        spot = spot + Fixed::from_int(drift);
        clock.advance(3_600);
        let now = clock.now();
        oracle.set_price(&underlying, &strike_asset, spot, now);
        protocol.set_spot(spot);
        swap_venue.set_price(spot);
        perp_venue.set_price(spot);

        let strike = strikes[(step as usize * 7) % strikes.len()];
        let series = OptionSeries::new(
            START + (14 + (step % 3) * 14) * DAY,
            Fixed::from_int(strike),
            step % 4 == 1,
            underlying.clone(),
            strike_asset.clone(),
            collateral_asset.clone(),
        );
        let amount = Fixed::from_int(1 + (step % 5) as i64);
        let is_sell = step % 5 == 3;

        match engine.execute_trade(&liquidity_pool, &series, amount, is_sell) {
            Ok(receipt) => println!(
                "{} {} {} for {} (iv {:.1}%)",
                if is_sell { "BOUGHT" } else { "SOLD  " },
                amount,
                series,
                receipt.quote.premium,
                receipt.quote.iv * 100.0
            ),
            Err(e) => warn!("trade rejected: {}", e),
        }

        if step % 6 == 5 {
            for (id, outcome) in engine.adjust_all_vaults(&keeper)? {
                if let Ok(adjustment) = outcome {
                    println!(
                        "   vault {} ({}) moved {}",
                        id, adjustment.status_before, adjustment.moved
                    );
                }
            }
        }

        if step % 10 == 9 {
            match engine.hedge_portfolio(&keeper) {
                Ok(Some(report)) => println!(
                    "HEDGE: target {} realized {} across {} reactor(s)",
                    report.target,
                    report.realized,
                    report.fills.len()
                ),
                Ok(None) => info!("portfolio delta within threshold"),
                Err(e) => warn!("hedge incomplete: {}", e),
            }
        }
    }

    // Run past the first expiry and clear what expired
    clock.advance(15 * DAY);
    oracle.set_price(&underlying, &strike_asset, spot, clock.now());
    protocol.set_settlement_price(Some(spot));
    for id in engine.collateral().vault_ids() {
        let expired = engine
            .collateral()
            .vault(id)
            .is_some_and(|v| v.series.is_expired(clock.now()));
        if expired {
            match engine.settle_vault(&keeper, id) {
                Ok(closure) => println!("SETTLED vault {}: {} returned", id, closure.returned),
                Err(e) => warn!("vault {} settlement failed: {}", id, e),
            }
        }
    }
    for settlement in engine.settle_expired_inventory(&keeper)? {
        println!(
            "REDEEMED {} {} for {}",
            settlement.amount, settlement.series, settlement.payout
        );
    }

    println!("\n{}", "═".repeat(50));
    println!("FINAL STATISTICS");
    println!("{}", "═".repeat(50));
    println!("{}", engine.metrics());

    let options_delta = engine.options_delta()?;
    let portfolio_delta = engine.portfolio_delta()?;
    println!("\nRisk Summary:");
    println!("  Options Delta:      {}", options_delta);
    println!("  Hedge Delta:        {}", portfolio_delta - options_delta);
    println!("  Portfolio Delta:    {}", portfolio_delta);
    println!("  Open Vaults:        {}", engine.collateral().len());
    println!("  Collateral Posted:  {}", engine.collateral().total_posted());
    println!("  Reactor Value:      {}", engine.reactor_value()?);
    println!("  Pool Funds:         {}", pool.available(&collateral_asset));

    let snapshot = engine.snapshot().to_bytes()?;
    println!("\nState snapshot: {} bytes", snapshot.len());
    println!("\nSimulation complete");

    Ok(())
}
