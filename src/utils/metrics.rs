//! Engine activity metrics

use serde::{Deserialize, Serialize};

/// Counters and latency statistics for one engine instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineMetrics {
    /// Quotes computed (including those that were not traded)
    quotes_served: usize,

    /// Quotes rejected with an error
    quotes_rejected: usize,

    /// Trades recorded against the pool
    trades_executed: usize,

    /// Collateral top-ups and withdrawals performed
    collateral_adjustments: usize,

    /// Rebalances dispatched to hedging reactors
    hedges_executed: usize,

    /// Rebalances that ended outside the shortfall tolerance
    hedge_shortfalls: usize,

    /// Absolute delta realized by reactors
    total_hedge_volume: f64,

    /// Sum of quote computation latencies (for average)
    total_quote_latency_ns: u64,

    /// Minimum quote latency
    min_quote_latency_ns: u64,

    /// Maximum quote latency
    max_quote_latency_ns: u64,

    /// Latency histogram (nanoseconds)
    latency_histogram: LatencyHistogram,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            quotes_served: 0,
            quotes_rejected: 0,
            trades_executed: 0,
            collateral_adjustments: 0,
            hedges_executed: 0,
            hedge_shortfalls: 0,
            total_hedge_volume: 0.0,
            total_quote_latency_ns: 0,
            min_quote_latency_ns: u64::MAX,
            max_quote_latency_ns: 0,
            latency_histogram: LatencyHistogram::new(),
        }
    }

    /// Record a successful quote and how long it took
    pub fn record_quote(&mut self, latency_ns: u64) {
        self.quotes_served += 1;
        self.total_quote_latency_ns += latency_ns;
        self.min_quote_latency_ns = self.min_quote_latency_ns.min(latency_ns);
        self.max_quote_latency_ns = self.max_quote_latency_ns.max(latency_ns);
        self.latency_histogram.record(latency_ns);
    }

    pub fn record_rejected_quote(&mut self) {
        self.quotes_rejected += 1;
    }

    pub fn record_trade(&mut self) {
        self.trades_executed += 1;
    }

    pub fn record_collateral_adjustment(&mut self) {
        self.collateral_adjustments += 1;
    }

    /// Record a rebalance and the delta it realized
    pub fn record_hedge(&mut self, realized: f64, shortfall: bool) {
        self.hedges_executed += 1;
        self.total_hedge_volume += realized.abs();
        if shortfall {
            self.hedge_shortfalls += 1;
        }
    }

    pub fn avg_quote_latency_ns(&self) -> u64 {
        if self.quotes_served == 0 {
            0
        } else {
            self.total_quote_latency_ns / self.quotes_served as u64
        }
    }

    pub fn min_quote_latency_ns(&self) -> u64 {
        if self.min_quote_latency_ns == u64::MAX {
            0
        } else {
            self.min_quote_latency_ns
        }
    }

    pub fn max_quote_latency_ns(&self) -> u64 {
        self.max_quote_latency_ns
    }

    pub fn quotes_served(&self) -> usize {
        self.quotes_served
    }

    pub fn quotes_rejected(&self) -> usize {
        self.quotes_rejected
    }

    pub fn trades_executed(&self) -> usize {
        self.trades_executed
    }

    pub fn collateral_adjustments(&self) -> usize {
        self.collateral_adjustments
    }

    pub fn hedges_executed(&self) -> usize {
        self.hedges_executed
    }

    pub fn hedge_shortfalls(&self) -> usize {
        self.hedge_shortfalls
    }

    pub fn total_hedge_volume(&self) -> f64 {
        self.total_hedge_volume
    }

    pub fn latency_percentile(&self, percentile: f64) -> u64 {
        self.latency_histogram.percentile(percentile)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            quotes_served: self.quotes_served,
            quotes_rejected: self.quotes_rejected,
            trades_executed: self.trades_executed,
            collateral_adjustments: self.collateral_adjustments,
            hedges_executed: self.hedges_executed,
            hedge_shortfalls: self.hedge_shortfalls,
            total_hedge_volume: self.total_hedge_volume,
            avg_latency_ns: self.avg_quote_latency_ns(),
            min_latency_ns: self.min_quote_latency_ns(),
            max_latency_ns: self.max_quote_latency_ns(),
            p50_latency_ns: self.latency_percentile(0.50),
            p99_latency_ns: self.latency_percentile(0.99),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Metrics summary for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub quotes_served: usize,
    pub quotes_rejected: usize,
    pub trades_executed: usize,
    pub collateral_adjustments: usize,
    pub hedges_executed: usize,
    pub hedge_shortfalls: usize,
    pub total_hedge_volume: f64,
    pub avg_latency_ns: u64,
    pub min_latency_ns: u64,
    pub max_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p99_latency_ns: u64,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Engine Metrics:")?;
        writeln!(f, "  Quotes Served:      {}", self.quotes_served)?;
        writeln!(f, "  Quotes Rejected:    {}", self.quotes_rejected)?;
        writeln!(f, "  Trades Executed:    {}", self.trades_executed)?;
        writeln!(f, "  Collateral Moves:   {}", self.collateral_adjustments)?;
        writeln!(f, "  Hedges Executed:    {}", self.hedges_executed)?;
        writeln!(f, "  Hedge Shortfalls:   {}", self.hedge_shortfalls)?;
        writeln!(f, "  Total Hedge Delta:  {:.4}", self.total_hedge_volume)?;
        writeln!(f, "\nQuote Latency:")?;
        writeln!(
            f,
            "  Average:  {} ns ({:.3} μs)",
            self.avg_latency_ns,
            self.avg_latency_ns as f64 / 1000.0
        )?;
        writeln!(
            f,
            "  Minimum:  {} ns ({:.3} μs)",
            self.min_latency_ns,
            self.min_latency_ns as f64 / 1000.0
        )?;
        writeln!(
            f,
            "  P50:      {} ns ({:.3} μs)",
            self.p50_latency_ns,
            self.p50_latency_ns as f64 / 1000.0
        )?;
        writeln!(
            f,
            "  P99:      {} ns ({:.3} μs)",
            self.p99_latency_ns,
            self.p99_latency_ns as f64 / 1000.0
        )?;
        writeln!(
            f,
            "  Maximum:  {} ns ({:.3} μs)",
            self.max_latency_ns,
            self.max_latency_ns as f64 / 1000.0
        )?;
        Ok(())
    }
}

/// Latency histogram for percentile calculation
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LatencyHistogram {
    /// Buckets: [0-1μs, 1-2μs, ..., 9-10μs, 10-20μs, ..., 90-100μs, >100μs]
    buckets: Vec<usize>,
    bucket_boundaries: Vec<u64>,
}

impl LatencyHistogram {
    fn new() -> Self {
        let mut boundaries = vec![];

        // 1-10μs in 1μs increments
        for i in 1..=10 {
            boundaries.push(i * 1_000);
        }

        // 10-100μs in 10μs increments
        for i in 2..=10 {
            boundaries.push(i * 10_000);
        }

        Self {
            buckets: vec![0; boundaries.len() + 1],
            bucket_boundaries: boundaries,
        }
    }

    fn record(&mut self, latency_ns: u64) {
        let bucket = self
            .bucket_boundaries
            .iter()
            .position(|&b| latency_ns < b)
            .unwrap_or(self.bucket_boundaries.len());

        self.buckets[bucket] += 1;
    }

    fn percentile(&self, p: f64) -> u64 {
        let total: usize = self.buckets.iter().sum();
        if total == 0 {
            return 0;
        }

        let target = ((total as f64 * p) as usize).max(1);
        let mut cumsum = 0;

        for (i, &count) in self.buckets.iter().enumerate() {
            cumsum += count;
            if cumsum >= target {
                return if i == 0 {
                    self.bucket_boundaries[0] / 2
                } else {
                    self.bucket_boundaries[i.min(self.bucket_boundaries.len() - 1)]
                };
            }
        }

        0
    }
}
