//! Portfolio exposure tracking and portfolio delta

mod compressed;
mod ledger;
mod tracker;

pub use compressed::{CompressedExposure, PortfolioAggregate};
pub use ledger::{LedgerEntry, PositionLedger};
pub use tracker::{DeltaContext, RiskTracker, TrackerMode, TrackerState};
