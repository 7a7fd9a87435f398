//! In-memory collaborators for the demo binary and tests

mod market;
mod protocol;
mod venues;

pub use market::{PaperCollateralPool, PaperPriceOracle};
pub use protocol::PaperMarginProtocol;
pub use venues::{PaperPerpVenue, PaperSwapVenue};
