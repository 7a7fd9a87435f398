//! Delta hedging: reactor adapters and the dispatcher that drives them

mod config;
mod dispatcher;
mod perp;
mod reactor;
mod spot;

pub use config::{HedgeRecommendation, HedgingConfig, Urgency};
pub use dispatcher::{HedgeDispatcher, HedgeFill, HedgeReport, ReactorFailure, ReactorRegistration};
pub use perp::{PerpReactor, margin_ratio_bps};
pub use reactor::{HedgingReactor, PerpVenue, SwapVenue};
pub use spot::SpotSwapReactor;
