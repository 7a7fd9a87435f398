//! Option series definitions and price feeds

mod oracle;
mod series;

pub use oracle::{OracleConfig, OracleGuard, PriceOracle, PriceReading};
pub use series::{Asset, OptionSeries, OptionSide, SeriesBounds, SeriesKey, StrikeRange};
