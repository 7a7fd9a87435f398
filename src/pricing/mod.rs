//! Option pricing and implied volatility

pub mod black_scholes;
mod sabr;
mod volatility;

pub use black_scholes::{MIN_TIME_YEARS, OptionPrice, price};
pub use sabr::{SabrExpiry, SabrParams, SabrSurface};
pub use volatility::{
    SKEW_TERMS, SkewBasis, SkewCoefficients, SkewFeatures, VolatilityModel, VolatilitySource,
    VolatilitySurface,
};
