//! Utility types and helpers

mod fixed;
mod metrics;
mod timestamp;

pub use fixed::{Fixed, MAX_BPS};
pub use metrics::{EngineMetrics, MetricsSummary};
pub use timestamp::{Clock, FixedClock, SECONDS_PER_YEAR, SystemClock, get_timestamp_ns, years_until};
