//! Closed-form Black-Scholes pricing
//!
//! Pure functions with no state. Inputs and outputs are `f64`; callers convert
//! ledger values with [`crate::Fixed::to_f64`].

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::f64::consts::{FRAC_1_SQRT_2, PI};

/// Below this time to expiry (one minute, in years) the option is priced at
/// intrinsic value of the discounted forward
pub const MIN_TIME_YEARS: f64 = 60.0 / 31_557_600.0;

/// Theoretical price and delta of one option
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionPrice {
    /// Premium per unit (>= 0)
    pub price: f64,

    /// dV/dS: [0, 1] for calls, [-1, 0] for puts
    pub delta: f64,
}

/// Standard normal CDF
#[inline]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

/// Standard normal PDF
#[inline]
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Price and delta of a European option
///
/// `time_years` below [`MIN_TIME_YEARS`] or a zero `iv` fall back to the
/// intrinsic value of the forward, discounted, with a 0/±1 delta.
pub fn price(spot: f64, strike: f64, time_years: f64, iv: f64, rfr: f64, is_put: bool) -> OptionPrice {
    if spot <= 0.0 || strike <= 0.0 {
        return OptionPrice {
            price: if is_put { strike.max(0.0) } else { spot.max(0.0) },
            delta: 0.0,
        };
    }

    if time_years < MIN_TIME_YEARS || iv <= 0.0 {
        return intrinsic(spot, strike, time_years.max(0.0), rfr, is_put);
    }

    let sqrt_t = time_years.sqrt();
    let vol_sqrt_t = iv * sqrt_t;
    let d1 = ((spot / strike).ln() + (rfr + 0.5 * iv * iv) * time_years) / vol_sqrt_t;
    let d2 = d1 - vol_sqrt_t;
    let discount = (-rfr * time_years).exp();

    let (value, delta) = if is_put {
        let nd1 = norm_cdf(-d1);
        (strike * discount * norm_cdf(-d2) - spot * nd1, -nd1)
    } else {
        let nd1 = norm_cdf(d1);
        (spot * nd1 - strike * discount * norm_cdf(d2), nd1)
    };

    OptionPrice {
        price: value.max(0.0),
        delta: if is_put {
            delta.clamp(-1.0, 0.0)
        } else {
            delta.clamp(0.0, 1.0)
        },
    }
}

/// Discount factor `exp(-r t)`
#[inline]
pub fn discount(rfr: f64, time_years: f64) -> f64 {
    (-rfr * time_years).exp()
}

fn intrinsic(spot: f64, strike: f64, time_years: f64, rfr: f64, is_put: bool) -> OptionPrice {
    let discounted_strike = strike * discount(rfr, time_years);
    if is_put {
        let value = (discounted_strike - spot).max(0.0);
        OptionPrice {
            price: value,
            delta: if value > 0.0 { -1.0 } else { 0.0 },
        }
    } else {
        let value = (spot - discounted_strike).max(0.0);
        OptionPrice {
            price: value,
            delta: if value > 0.0 { 1.0 } else { 0.0 },
        }
    }
}
