use crate::market_data::OptionSide;
use crate::pricing::SabrSurface;
use crate::utils::{Fixed, years_until};
use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// Number of terms in the skew polynomial
pub const SKEW_TERMS: usize = 7;

/// Feature vector the coefficients are dotted with
pub type SkewFeatures = SVector<f64, SKEW_TERMS>;

/// Anything that can produce an implied volatility for a strike and expiry
pub trait VolatilitySource {
    /// Implied volatility as a decimal (0.8 = 80%). Not clamped: a negative
    /// value signals a mis-configured surface.
    fn implied_volatility(
        &self,
        side: OptionSide,
        spot: Fixed,
        strike: Fixed,
        expiration: u64,
        now: u64,
    ) -> crate::Result<f64>;
}

/// Feature map from (log-moneyness, time) to the 7 polynomial terms
///
/// `m = ln(strike / spot)`, `t` = years to expiry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SkewBasis {
    /// `[1, m, t, m², m·t, t², m³]`
    #[default]
    Polynomial,

    /// `[1, m, √t, m², m·√t, t, m³]`
    SqrtTime,
}

impl SkewBasis {
    pub fn features(self, log_moneyness: f64, time_years: f64) -> SkewFeatures {
        let m = log_moneyness;
        let t = match self {
            SkewBasis::Polynomial => time_years,
            SkewBasis::SqrtTime => time_years.max(0.0).sqrt(),
        };
        SkewFeatures::from([1.0, m, t, m * m, m * t, t * t, m * m * m])
    }
}

/// One side's polynomial coefficients
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SkewCoefficients(pub [Fixed; SKEW_TERMS]);

impl SkewCoefficients {
    pub fn from_f64(values: [f64; SKEW_TERMS]) -> Self {
        Self(values.map(Fixed::from_f64))
    }

    /// Flat surface at `iv`
    pub fn flat(iv: f64) -> Self {
        let mut values = [0.0; SKEW_TERMS];
        values[0] = iv;
        Self::from_f64(values)
    }

    fn as_vector(&self) -> SkewFeatures {
        SkewFeatures::from(self.0.map(Fixed::to_f64))
    }
}

/// Skew polynomial store, one coefficient vector per side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySurface {
    basis: SkewBasis,
    call_coefficients: SkewCoefficients,
    put_coefficients: SkewCoefficients,
}

impl Default for VolatilitySurface {
    fn default() -> Self {
        Self::flat(0.8)
    }
}

impl VolatilitySurface {
    pub fn new(basis: SkewBasis, call: SkewCoefficients, put: SkewCoefficients) -> Self {
        Self {
            basis,
            call_coefficients: call,
            put_coefficients: put,
        }
    }

    /// Same flat volatility for every strike, expiry and side
    pub fn flat(iv: f64) -> Self {
        Self::new(
            SkewBasis::Polynomial,
            SkewCoefficients::flat(iv),
            SkewCoefficients::flat(iv),
        )
    }

    pub fn basis(&self) -> SkewBasis {
        self.basis
    }

    pub fn coefficients(&self, side: OptionSide) -> &SkewCoefficients {
        match side {
            OptionSide::Call => &self.call_coefficients,
            OptionSide::Put => &self.put_coefficients,
        }
    }

    /// Replace one side's whole coefficient vector
    pub fn set_volatility_skew(&mut self, coefficients: SkewCoefficients, is_put: bool) {
        match OptionSide::from_is_put(is_put) {
            OptionSide::Call => self.call_coefficients = coefficients,
            OptionSide::Put => self.put_coefficients = coefficients,
        }
    }

    pub fn set_basis(&mut self, basis: SkewBasis) {
        self.basis = basis;
    }

    /// Evaluate the surface for a series
    pub fn get_implied_volatility(
        &self,
        is_put: bool,
        spot: Fixed,
        strike: Fixed,
        expiration: u64,
        now: u64,
    ) -> crate::Result<f64> {
        if !spot.is_positive() || !strike.is_positive() {
            return Err(crate::Error::Calculation(format!(
                "cannot evaluate skew at spot {} strike {}",
                spot, strike
            )));
        }

        let log_moneyness = (strike.to_f64() / spot.to_f64()).ln();
        let time_years = years_until(expiration, now).max(0.0);
        let features = self.basis.features(log_moneyness, time_years);
        let coefficients = self.coefficients(OptionSide::from_is_put(is_put)).as_vector();

        Ok(coefficients.dot(&features))
    }
}

impl VolatilitySource for VolatilitySurface {
    fn implied_volatility(
        &self,
        side: OptionSide,
        spot: Fixed,
        strike: Fixed,
        expiration: u64,
        now: u64,
    ) -> crate::Result<f64> {
        self.get_implied_volatility(side.is_put(), spot, strike, expiration, now)
    }
}

/// The volatility model an engine prices with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VolatilityModel {
    Skew(VolatilitySurface),
    Sabr(SabrSurface),
}

impl Default for VolatilityModel {
    fn default() -> Self {
        VolatilityModel::Skew(VolatilitySurface::default())
    }
}

impl VolatilitySource for VolatilityModel {
    fn implied_volatility(
        &self,
        side: OptionSide,
        spot: Fixed,
        strike: Fixed,
        expiration: u64,
        now: u64,
    ) -> crate::Result<f64> {
        match self {
            VolatilityModel::Skew(surface) => {
                surface.implied_volatility(side, spot, strike, expiration, now)
            }
            VolatilityModel::Sabr(surface) => {
                surface.implied_volatility(side, spot, strike, expiration, now)
            }
        }
    }
}
