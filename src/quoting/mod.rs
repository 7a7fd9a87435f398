//! Premium quoting: vanilla price plus slippage, spread and financing

mod config;
mod engine;
mod quote;

pub use config::{DeltaBorrowRates, MultiplierKind, PricingParams, TenorParams};
pub use engine::{QuoteEngine, QuoteInputs};
pub use quote::{FeeBreakdown, Quote};
