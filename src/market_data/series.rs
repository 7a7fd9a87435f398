use crate::utils::Fixed;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Asset identifier (token symbol or address)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Asset(pub String);

impl Asset {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Call or put
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSide {
    Call,
    Put,
}

impl OptionSide {
    #[inline]
    pub fn from_is_put(is_put: bool) -> Self {
        if is_put { OptionSide::Put } else { OptionSide::Call }
    }

    #[inline]
    pub fn is_put(self) -> bool {
        matches!(self, OptionSide::Put)
    }

    /// Array slot used by per-side storage (`[call, put]`)
    #[inline]
    pub fn index(self) -> usize {
        match self {
            OptionSide::Call => 0,
            OptionSide::Put => 1,
        }
    }
}

impl fmt::Display for OptionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionSide::Call => f.write_str("call"),
            OptionSide::Put => f.write_str("put"),
        }
    }
}

/// Identity of a series within one pool: (expiration, strike, side)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub expiration: u64,
    pub strike: Fixed,
    pub is_put: bool,
}

/// An option contract definition. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptionSeries {
    /// Expiration (unix seconds)
    pub expiration: u64,

    /// Strike, denominated in the strike asset
    pub strike: Fixed,

    pub is_put: bool,

    pub underlying: Asset,

    pub strike_asset: Asset,

    pub collateral_asset: Asset,
}

impl OptionSeries {
    pub fn new(
        expiration: u64,
        strike: Fixed,
        is_put: bool,
        underlying: Asset,
        strike_asset: Asset,
        collateral_asset: Asset,
    ) -> Self {
        Self {
            expiration,
            strike,
            is_put,
            underlying,
            strike_asset,
            collateral_asset,
        }
    }

    #[inline]
    pub fn side(&self) -> OptionSide {
        OptionSide::from_is_put(self.is_put)
    }

    #[inline]
    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            expiration: self.expiration,
            strike: self.strike,
            is_put: self.is_put,
        }
    }

    #[inline]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration <= now
    }
}

impl fmt::Display for OptionSeries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.underlying,
            self.expiration,
            self.strike,
            if self.is_put { "P" } else { "C" }
        )
    }
}

/// Allowed strike interval for one side
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrikeRange {
    pub min: Fixed,
    pub max: Fixed,
}

impl StrikeRange {
    pub fn new(min: Fixed, max: Fixed) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, strike: Fixed) -> bool {
        strike >= self.min && strike <= self.max
    }
}

/// Issuance limits for new series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesBounds {
    pub call_strikes: StrikeRange,
    pub put_strikes: StrikeRange,

    /// Shortest allowed time to expiry at issuance (seconds)
    pub min_expiry_secs: u64,

    /// Longest allowed time to expiry at issuance (seconds)
    pub max_expiry_secs: u64,
}

impl Default for SeriesBounds {
    fn default() -> Self {
        Self {
            call_strikes: StrikeRange::new(Fixed::ZERO, Fixed::from_int(1_000_000)),
            put_strikes: StrikeRange::new(Fixed::ZERO, Fixed::from_int(1_000_000)),
            min_expiry_secs: 86_400,
            max_expiry_secs: 365 * 86_400,
        }
    }
}

impl SeriesBounds {
    pub fn strikes(&self, side: OptionSide) -> &StrikeRange {
        match side {
            OptionSide::Call => &self.call_strikes,
            OptionSide::Put => &self.put_strikes,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        for side in [OptionSide::Call, OptionSide::Put] {
            let range = self.strikes(side);
            if range.min.is_negative() || range.min > range.max {
                return Err(crate::Error::ConfigInvalid(format!(
                    "{} strike range [{}, {}] is empty or negative",
                    side, range.min, range.max
                )));
            }
        }

        if self.min_expiry_secs > self.max_expiry_secs {
            return Err(crate::Error::ConfigInvalid(format!(
                "expiry window [{}, {}] is empty",
                self.min_expiry_secs, self.max_expiry_secs
            )));
        }

        Ok(())
    }

    /// Check a series against the issuance limits at time `now`
    pub fn check(&self, series: &OptionSeries, now: u64) -> crate::Result<()> {
        let range = self.strikes(series.side());
        if !range.contains(series.strike) {
            return Err(crate::Error::BoundsViolation(format!(
                "strike {} outside [{}, {}] for {}s",
                series.strike,
                range.min,
                range.max,
                series.side()
            )));
        }

        if series.expiration <= now {
            return Err(crate::Error::BoundsViolation(format!(
                "series {} already expired",
                series
            )));
        }

        let time_to_expiry = series.expiration - now;
        if time_to_expiry < self.min_expiry_secs || time_to_expiry > self.max_expiry_secs {
            return Err(crate::Error::BoundsViolation(format!(
                "time to expiry {}s outside [{}, {}]",
                time_to_expiry, self.min_expiry_secs, self.max_expiry_secs
            )));
        }

        Ok(())
    }
}
