//! Latency benchmarks using Criterion

use criterion::measurement::WallTime;
use criterion::{BenchmarkGroup, BenchmarkId, Criterion, criterion_group, criterion_main};
use options_risk_engine::market_data::Asset;
use options_risk_engine::pricing::{self, VolatilitySource};
use options_risk_engine::quoting::QuoteInputs;
use options_risk_engine::risk::{DeltaContext, TrackerState};
use options_risk_engine::sim::{PaperCollateralPool, PaperMarginProtocol, PaperPriceOracle};
use options_risk_engine::*;
use std::hint::black_box;
use std::sync::Arc;

const NOW: u64 = 1_700_000_000;
const DAY: u64 = 86_400;

fn series(strike: i64, days: u64, is_put: bool) -> OptionSeries {
    OptionSeries::new(
        NOW + days * DAY,
        Fixed::from_int(strike),
        is_put,
        Asset::new("WETH"),
        Asset::new("USDC"),
        Asset::new("USDC"),
    )
}

fn bench_black_scholes(c: &mut Criterion) {
    c.bench_function("black_scholes_call", |b| {
        b.iter(|| {
            black_box(pricing::price(
                black_box(2000.0),
                black_box(2200.0),
                black_box(0.08),
                black_box(0.8),
                black_box(0.03),
                false,
            ))
        });
    });
}

fn bench_volatility(c: &mut Criterion) {
    let surface = VolatilitySurface::default();
    let spot = Fixed::from_int(2000);

    c.bench_function("skew_implied_volatility", |b| {
        b.iter(|| {
            black_box(surface.implied_volatility(
                OptionSide::Call,
                black_box(spot),
                black_box(Fixed::from_int(2200)),
                NOW + 30 * DAY,
                NOW,
            ))
        });
    });
}

fn bench_quote(c: &mut Criterion) {
    let engine = QuoteEngine::new(PricingParams::default()).unwrap();
    let surface = VolatilitySurface::default();
    let s = series(2200, 30, false);
    let inputs = QuoteInputs {
        series: &s,
        amount: Fixed::from_int(5),
        is_sell: false,
        spot: Fixed::from_int(2000),
        now: NOW,
        risk_free_rate: 0.0,
        net_exposure: -Fixed::from_int(20),
        covered_inventory: Fixed::ZERO,
        margin_per_contract: Fixed::from_int(2000),
    };

    c.bench_function("quote_engine_buy", |b| {
        b.iter(|| black_box(engine.quote(black_box(&inputs), &surface)));
    });
}

fn bench_portfolio_delta(c: &mut Criterion) {
    let mut group: BenchmarkGroup<WallTime> = c.benchmark_group("portfolio_delta");
    let surface = VolatilitySurface::default();

    for mode in [TrackerMode::Compressed, TrackerMode::Ledger] {
        for positions in [10u64, 100, 1000] {
            let mut tracker = TrackerState::empty(mode).into_tracker();
            for i in 0..positions {
                let s = series(1500 + (i % 40) as i64 * 25, 7 + i % 180, i % 2 == 0);
                tracker.record_trade(&s, -Fixed::ONE).unwrap();
            }
            let ctx = DeltaContext {
                spot: Fixed::from_int(2000),
                now: NOW,
                risk_free_rate: 0.0,
                volatility: &surface,
            };

            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", mode), positions),
                &positions,
                |b, _| b.iter(|| black_box(tracker.portfolio_delta(&ctx))),
            );
        }
    }

    group.finish();
}

fn bench_engine_quote(c: &mut Criterion) {
    let oracle = Arc::new(PaperPriceOracle::new());
    oracle.set_price(&Asset::new("WETH"), &Asset::new("USDC"), Fixed::from_int(2000), NOW);
    let engine = RiskEngine::new(
        EngineConfig::default(),
        Collaborators {
            oracle,
            protocol: Arc::new(PaperMarginProtocol::new(10_000)),
            pool: Arc::new(PaperCollateralPool::new()),
            clock: Arc::new(FixedClock::new(NOW)),
        },
        AccountId::new("governor"),
    )
    .unwrap();
    let s = series(2200, 30, false);

    c.bench_function("engine_quote_end_to_end", |b| {
        b.iter(|| black_box(engine.quote(&s, black_box(Fixed::ONE), false)));
    });
}

criterion_group!(
    benches,
    bench_black_scholes,
    bench_volatility,
    bench_quote,
    bench_portfolio_delta,
    bench_engine_quote,
);

criterion_main!(benches);
