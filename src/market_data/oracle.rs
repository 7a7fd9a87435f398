use crate::market_data::Asset;
use crate::utils::Fixed;
use log::warn;
use serde::{Deserialize, Serialize};

/// A single price observation
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceReading {
    /// Price of one unit of base, denominated in quote
    pub price: Fixed,

    /// When the feed last updated (unix seconds)
    pub updated_at: u64,

    /// Whether the L2 sequencer reported healthy at read time
    pub sequencer_up: bool,
}

/// External price feed
pub trait PriceOracle: Send + Sync {
    /// Price of `base` in units of `quote`
    fn normalized_rate(&self, base: &Asset, quote: &Asset) -> crate::Result<PriceReading>;
}

/// Oracle acceptance limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Maximum age of a reading before pricing refuses to proceed (seconds)
    pub max_price_age_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_price_age_secs: 3_600,
        }
    }
}

impl OracleConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_price_age_secs == 0 {
            return Err(crate::Error::ConfigInvalid(
                "Oracle max price age must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Wraps an oracle read with staleness and sequencer checks
#[derive(Debug, Clone)]
pub struct OracleGuard {
    config: OracleConfig,
}

impl OracleGuard {
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Read a price, failing with `StaleOracle` when it cannot be trusted
    pub fn checked_price(
        &self,
        oracle: &dyn PriceOracle,
        base: &Asset,
        quote: &Asset,
        now: u64,
    ) -> crate::Result<Fixed> {
        let reading = oracle.normalized_rate(base, quote)?;
        self.accept(reading, now).inspect_err(|e| {
            warn!("rejecting {}/{} price: {}", base, quote, e);
        })
    }

    /// Validate a reading taken at `now`
    pub fn accept(&self, reading: PriceReading, now: u64) -> crate::Result<Fixed> {
        if !reading.sequencer_up {
            return Err(crate::Error::StaleOracle("sequencer is down".to_string()));
        }

        let age = now.saturating_sub(reading.updated_at);
        if age > self.config.max_price_age_secs {
            return Err(crate::Error::StaleOracle(format!(
                "price is {}s old, limit {}s",
                age, self.config.max_price_age_secs
            )));
        }

        if !reading.price.is_positive() {
            return Err(crate::Error::StaleOracle(format!(
                "non-positive price {}",
                reading.price
            )));
        }

        Ok(reading.price)
    }
}
