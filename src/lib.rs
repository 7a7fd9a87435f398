//! # Options Risk Engine
//!
//! Pricing, portfolio-risk, collateral-health and delta-hedging core for an
//! options liquidity pool.
//!
//! ## Features
//!
//! - Black-Scholes pricing with a skew polynomial or SABR volatility surface
//! - Quotes with slippage, bid/ask spread, collateral and delta financing fees
//! - Constant-size or per-series exposure tracking
//! - Collateral health bands with automatic top-up and withdrawal
//! - Delta hedging routed across pluggable reactors
//! - Snapshot and restore of the whole engine state
//!
//! ## Quick Start
//!
//! ```
//! use options_risk_engine::*;
//! use options_risk_engine::sim::{PaperCollateralPool, PaperMarginProtocol, PaperPriceOracle};
//! use std::sync::Arc;
//!
//! let now = 1_700_000_000;
//! let oracle = Arc::new(PaperPriceOracle::new());
//! oracle.set_price(&Asset::new("WETH"), &Asset::new("USDC"), Fixed::from_int(2000), now);
//!
//! let engine = RiskEngine::new(
//!     EngineConfig::default(),
//!     Collaborators {
//!         oracle,
//!         protocol: Arc::new(PaperMarginProtocol::new(10_000)),
//!         pool: Arc::new(PaperCollateralPool::new()),
//!         clock: Arc::new(FixedClock::new(now)),
//!     },
//!     AccountId::new("governor"),
//! )?;
//!
//! let series = OptionSeries::new(
//!     now + 7 * 86_400,
//!     Fixed::from_int(2100),
//!     false,
//!     Asset::new("WETH"),
//!     Asset::new("USDC"),
//!     Asset::new("USDC"),
//! );
//! let quote = engine.quote(&series, Fixed::ONE, false)?;
//! assert!(quote.premium.is_positive());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod collateral;
pub mod engine;
pub mod hedging;
pub mod market_data;
pub mod pricing;
pub mod quoting;
pub mod risk;
pub mod sim;
pub mod utils;

// Re-exports
pub use collateral::{
    CollateralHealthMonitor, CollateralPool, HealthBounds, HealthStatus, MarginProtocol,
    SideHealthBounds, VaultHealth, VaultId,
};
pub use engine::{
    AccountId, Collaborators, EngineConfig, EngineState, InventorySettlement, RiskEngine, Role,
    TradeReceipt,
};
pub use hedging::{
    HedgeDispatcher, HedgeRecommendation, HedgeReport, HedgingConfig, HedgingReactor, PerpReactor,
    SpotSwapReactor,
};
pub use market_data::{Asset, OptionSeries, OptionSide, PriceOracle, SeriesBounds};
pub use pricing::{OptionPrice, SabrSurface, VolatilityModel, VolatilitySource, VolatilitySurface};
pub use quoting::{PricingParams, Quote, QuoteEngine};
pub use risk::{RiskTracker, TrackerMode};
pub use utils::{Clock, EngineMetrics, Fixed, FixedClock, SystemClock, get_timestamp_ns};

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigInvalid(String),

    #[error("Bounds violation: {0}")]
    BoundsViolation(String),

    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Fixed, available: Fixed },

    #[error("Stale oracle: {0}")]
    StaleOracle(String),

    #[error("Vault {vault_id} health factor {health_factor} outside [{lower}, {upper}]")]
    HealthFactorBreach {
        vault_id: VaultId,
        health_factor: u64,
        lower: u32,
        upper: u32,
    },

    #[error("Unauthorized: {caller} lacks role {required}")]
    UnauthorizedCaller { caller: String, required: Role },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Venue error: {0}")]
    Venue(String),

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the same call may succeed later without a config change
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::StaleOracle(_) | Error::InsufficientLiquidity { .. } | Error::Venue(_)
        )
    }
}
