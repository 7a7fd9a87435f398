use crate::collateral::SideHealthBounds;
use crate::hedging::HedgingConfig;
use crate::market_data::{Asset, OracleConfig, SeriesBounds};
use crate::pricing::VolatilityModel;
use crate::quoting::PricingParams;
use crate::risk::TrackerMode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete engine configuration
///
/// Every section has a working default, so a JSON file only needs the keys
/// it changes:
///
/// ```
/// use options_risk_engine::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "risk_free_rate": 0.03 }"#)?;
/// assert_eq!(config.risk_free_rate, 0.03);
/// # Ok::<(), options_risk_engine::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Asset the options are written on
    pub underlying: Asset,

    /// Asset strikes and premiums are denominated in
    pub strike_asset: Asset,

    /// Asset vaults are collateralised with
    pub collateral_asset: Asset,

    /// Continuously compounded annual rate used in pricing
    pub risk_free_rate: f64,

    pub tracker_mode: TrackerMode,

    pub pricing: PricingParams,

    pub series_bounds: SeriesBounds,

    pub health_bounds: SideHealthBounds,

    pub hedging: HedgingConfig,

    pub oracle: OracleConfig,

    /// Initial volatility model
    pub volatility: VolatilityModel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            underlying: Asset::new("WETH"),
            strike_asset: Asset::new("USDC"),
            collateral_asset: Asset::new("USDC"),
            risk_free_rate: 0.0,
            tracker_mode: TrackerMode::default(),
            pricing: PricingParams::default(),
            series_bounds: SeriesBounds::default(),
            health_bounds: SideHealthBounds::default(),
            hedging: HedgingConfig::default(),
            oracle: OracleConfig::default(),
            volatility: VolatilityModel::default(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if !self.risk_free_rate.is_finite() {
            return Err(crate::Error::ConfigInvalid(
                "Risk-free rate must be finite".to_string(),
            ));
        }

        if self.underlying == self.strike_asset {
            return Err(crate::Error::ConfigInvalid(format!(
                "Underlying and strike asset are both {}",
                self.underlying
            )));
        }

        self.pricing.validate()?;
        self.series_bounds.validate()?;
        self.health_bounds.validate()?;
        self.hedging.validate()?;
        self.oracle.validate()?;
        Ok(())
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| crate::Error::ConfigInvalid(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::ConfigInvalid(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}
