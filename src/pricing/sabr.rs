//! SABR volatility model (Hagan et al., 2002 lognormal expansion)

use crate::market_data::OptionSide;
use crate::pricing::VolatilitySource;
use crate::utils::{Fixed, years_until};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Below this |z| the expansion uses its z → 0 limit
const Z_EPSILON: f64 = 1e-7;

/// SABR parameters for one side of one expiry
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SabrParams {
    /// ATM volatility level, > 0
    pub alpha: f64,

    /// Degree of lognormality, in [0, 1]
    pub beta: f64,

    /// Spot/vol correlation, in (-1, 1)
    pub rho: f64,

    /// Vol of vol, >= 0
    pub nu: f64,
}

impl SabrParams {
    pub fn validate(&self) -> crate::Result<()> {
        if !(self.alpha > 0.0)
            || !(0.0..=1.0).contains(&self.beta)
            || !(self.rho > -1.0 && self.rho < 1.0)
            || !(self.nu >= 0.0)
        {
            return Err(crate::Error::ConfigInvalid(format!(
                "SABR parameters out of range: {:?}",
                self
            )));
        }
        Ok(())
    }

    /// Black volatility for strike `k`, forward `f`, `t` years
    pub fn lognormal_vol(&self, k: f64, f: f64, t: f64) -> f64 {
        let SabrParams {
            alpha,
            beta,
            rho,
            nu,
        } = *self;

        let log_fk = (f / k).ln();
        let fk_beta = (f * k).powf(1.0 - beta);
        let one_minus_beta = 1.0 - beta;

        let a = one_minus_beta.powi(2) * alpha * alpha / (24.0 * fk_beta);
        let b = 0.25 * rho * beta * nu * alpha / fk_beta.sqrt();
        let c = (2.0 - 3.0 * rho * rho) * nu * nu / 24.0;
        let d = fk_beta.sqrt();
        let v = one_minus_beta.powi(2) * log_fk.powi(2) / 24.0;
        let w = one_minus_beta.powi(4) * log_fk.powi(4) / 1920.0;
        let z = nu * fk_beta.sqrt() * log_fk / alpha;

        let time_term = 1.0 + (a + b + c) * t;
        if z.abs() > Z_EPSILON {
            alpha * z * time_term / (d * (1.0 + v + w) * x_of_z(rho, z))
        } else {
            alpha * time_term / (d * (1.0 + v + w))
        }
    }
}

fn x_of_z(rho: f64, z: f64) -> f64 {
    let a = (1.0 - 2.0 * rho * z + z * z).sqrt() + z - rho;
    let b = 1.0 - rho;
    (a / b).ln()
}

/// SABR parameters for a single expiration
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SabrExpiry {
    pub call: SabrParams,
    pub put: SabrParams,

    /// Rate used to roll spot forward to the expiry
    pub interest_rate: f64,
}

/// Per-expiration SABR surface
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SabrSurface {
    expiries: BTreeMap<u64, SabrExpiry>,
}

impl SabrSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace parameters for an expiration
    pub fn set_expiry(&mut self, expiration: u64, params: SabrExpiry) -> crate::Result<()> {
        params.call.validate()?;
        params.put.validate()?;
        self.expiries.insert(expiration, params);
        Ok(())
    }

    pub fn expiry(&self, expiration: u64) -> Option<&SabrExpiry> {
        self.expiries.get(&expiration)
    }

    /// Parameters for `expiration`, or for the closest configured expiry when
    /// there is no exact entry (synthetic aggregate expiries land between them)
    pub fn params_for(&self, expiration: u64) -> Option<&SabrExpiry> {
        if let Some(exact) = self.expiries.get(&expiration) {
            return Some(exact);
        }

        let below = self.expiries.range(..expiration).next_back();
        let above = self.expiries.range(expiration..).next();
        match (below, above) {
            (Some((b, pb)), Some((a, pa))) => {
                if expiration - b <= a - expiration {
                    Some(pb)
                } else {
                    Some(pa)
                }
            }
            (Some((_, p)), None) | (None, Some((_, p))) => Some(p),
            (None, None) => None,
        }
    }

    pub fn expirations(&self) -> impl Iterator<Item = u64> + '_ {
        self.expiries.keys().copied()
    }
}

impl VolatilitySource for SabrSurface {
    fn implied_volatility(
        &self,
        side: OptionSide,
        spot: Fixed,
        strike: Fixed,
        expiration: u64,
        now: u64,
    ) -> crate::Result<f64> {
        let params = self.params_for(expiration).ok_or_else(|| {
            crate::Error::ConfigInvalid(format!("no SABR parameters for expiry {}", expiration))
        })?;

        if !spot.is_positive() || !strike.is_positive() {
            return Err(crate::Error::Calculation(format!(
                "cannot evaluate SABR at spot {} strike {}",
                spot, strike
            )));
        }

        let t = years_until(expiration, now).max(0.0);
        let forward = spot.to_f64() * (params.interest_rate * t).exp();
        let side_params = match side {
            OptionSide::Call => &params.call,
            OptionSide::Put => &params.put,
        };

        Ok(side_params.lognormal_vol(strike.to_f64(), forward, t))
    }
}
