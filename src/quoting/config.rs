use crate::market_data::OptionSide;
use crate::utils::{Fixed, MAX_BPS};
use serde::{Deserialize, Serialize};

/// Delta bands always partition 0..=100 (|delta| in percent)
const DELTA_PERCENT: u32 = 100;

/// Annualised hedge-financing rates, in bps, by trade direction
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaBorrowRates {
    /// User sells a put: pool hedges by going long
    pub sell_long: u32,

    /// User sells a call: pool hedges by going short
    pub sell_short: u32,

    /// User buys a call: pool hedges by going long
    pub buy_long: u32,

    /// User buys a put: pool hedges by going short
    pub buy_short: u32,
}

impl Default for DeltaBorrowRates {
    fn default() -> Self {
        Self {
            sell_long: 150,
            sell_short: 195,
            buy_long: 150,
            buy_short: 195,
        }
    }
}

impl DeltaBorrowRates {
    /// Rate for a trade of `side` in direction `is_sell`
    pub fn rate_bps(&self, side: OptionSide, is_sell: bool) -> u32 {
        match (is_sell, side) {
            (true, OptionSide::Put) => self.sell_long,
            (true, OptionSide::Call) => self.sell_short,
            (false, OptionSide::Call) => self.buy_long,
            (false, OptionSide::Put) => self.buy_short,
        }
    }
}

/// Per-band multiplier arrays for one tenor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenorParams {
    pub call_slippage_multipliers: Vec<Fixed>,
    pub put_slippage_multipliers: Vec<Fixed>,
    pub call_collateral_multipliers: Vec<Fixed>,
    pub put_collateral_multipliers: Vec<Fixed>,
    pub call_delta_multipliers: Vec<Fixed>,
    pub put_delta_multipliers: Vec<Fixed>,
}

/// Which multiplier family a lookup reads
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MultiplierKind {
    Slippage,
    Collateral,
    Delta,
}

impl TenorParams {
    /// Every multiplier set to `value` for `bands` bands
    pub fn uniform(bands: usize, value: Fixed) -> Self {
        let row = vec![value; bands];
        Self {
            call_slippage_multipliers: row.clone(),
            put_slippage_multipliers: row.clone(),
            call_collateral_multipliers: row.clone(),
            put_collateral_multipliers: row.clone(),
            call_delta_multipliers: row.clone(),
            put_delta_multipliers: row,
        }
    }

    pub fn multipliers(&self, kind: MultiplierKind, side: OptionSide) -> &[Fixed] {
        match (kind, side) {
            (MultiplierKind::Slippage, OptionSide::Call) => &self.call_slippage_multipliers,
            (MultiplierKind::Slippage, OptionSide::Put) => &self.put_slippage_multipliers,
            (MultiplierKind::Collateral, OptionSide::Call) => &self.call_collateral_multipliers,
            (MultiplierKind::Collateral, OptionSide::Put) => &self.put_collateral_multipliers,
            (MultiplierKind::Delta, OptionSide::Call) => &self.call_delta_multipliers,
            (MultiplierKind::Delta, OptionSide::Put) => &self.put_delta_multipliers,
        }
    }

    fn arrays(&self) -> [(&'static str, &[Fixed]); 6] {
        [
            ("call slippage", &self.call_slippage_multipliers),
            ("put slippage", &self.put_slippage_multipliers),
            ("call collateral", &self.call_collateral_multipliers),
            ("put collateral", &self.put_collateral_multipliers),
            ("call delta", &self.call_delta_multipliers),
            ("put delta", &self.put_delta_multipliers),
        ]
    }
}

/// Pool pricing parameters (governance controlled)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingParams {
    /// Base slippage gradient per contract of exposure (0.001 = 0.1%)
    pub slippage_gradient: Fixed,

    /// Width of one delta band in percent; must divide 100
    pub delta_band_width: u32,

    /// Symmetric bid/ask spread applied to the slipped premium
    pub bid_ask_spread_bps: u32,

    /// Annual cost of borrowing the collateral a new short locks up
    pub collateral_lending_rate_bps: u32,

    pub delta_borrow_rates: DeltaBorrowRates,

    /// √seconds-to-expiry that maps onto the last tenor
    pub max_tenor_value: f64,

    /// Multiplier arrays, shortest tenor first
    pub tenors: Vec<TenorParams>,
}

impl Default for PricingParams {
    fn default() -> Self {
        let band_width = 20;
        let bands = (DELTA_PERCENT / band_width) as usize;
        Self {
            slippage_gradient: Fixed::from_f64(0.001),
            delta_band_width: band_width,
            bid_ask_spread_bps: 50,
            collateral_lending_rate_bps: 400,
            delta_borrow_rates: DeltaBorrowRates::default(),
            max_tenor_value: 2800.0,
            tenors: vec![TenorParams::uniform(bands, Fixed::ONE); 3],
        }
    }
}

impl PricingParams {
    /// Number of delta bands implied by the band width
    pub fn band_count(&self) -> usize {
        if self.delta_band_width == 0 {
            return 0;
        }
        (DELTA_PERCENT / self.delta_band_width) as usize
    }

    /// Band holding an option of the given delta
    pub fn band_index(&self, delta: f64) -> usize {
        let bands = self.band_count().max(1);
        let index = (delta.abs() * DELTA_PERCENT as f64 / self.delta_band_width.max(1) as f64)
            .floor() as usize;
        index.min(bands - 1)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.delta_band_width == 0
            || self.delta_band_width > DELTA_PERCENT
            || DELTA_PERCENT % self.delta_band_width != 0
        {
            return Err(crate::Error::ConfigInvalid(format!(
                "delta band width {} must divide 100",
                self.delta_band_width
            )));
        }

        if self.slippage_gradient.is_negative() {
            return Err(crate::Error::ConfigInvalid(
                "slippage gradient must be non-negative".into(),
            ));
        }

        if self.bid_ask_spread_bps > MAX_BPS {
            return Err(crate::Error::ConfigInvalid(format!(
                "bid/ask spread {} bps exceeds 100%",
                self.bid_ask_spread_bps
            )));
        }

        if self.tenors.is_empty() {
            return Err(crate::Error::ConfigInvalid(
                "at least one tenor is required".into(),
            ));
        }

        if !(self.max_tenor_value.is_finite() && self.max_tenor_value > 0.0) {
            return Err(crate::Error::ConfigInvalid(format!(
                "max tenor value {} must be positive",
                self.max_tenor_value
            )));
        }

        let bands = self.band_count();
        for (tenor_index, tenor) in self.tenors.iter().enumerate() {
            for (name, values) in tenor.arrays() {
                if values.len() != bands {
                    return Err(crate::Error::ConfigInvalid(format!(
                        "tenor {} {} multipliers: expected {} bands, got {}",
                        tenor_index,
                        name,
                        bands,
                        values.len()
                    )));
                }
                if values.iter().any(|v| v.is_negative()) {
                    return Err(crate::Error::ConfigInvalid(format!(
                        "tenor {} {} multipliers must be non-negative",
                        tenor_index, name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Multiplier for a band, linearly interpolated across tenors
    ///
    /// Tenor coordinate: `u = √(expiration − now) · (N − 1) / max_tenor_value`,
    /// lower tenor `⌊u⌋` clamped to `N − 2`.
    pub fn interpolated_multiplier(
        &self,
        kind: MultiplierKind,
        side: OptionSide,
        band: usize,
        seconds_to_expiry: u64,
    ) -> crate::Result<f64> {
        let read = |tenor: &TenorParams| -> crate::Result<f64> {
            tenor
                .multipliers(kind, side)
                .get(band)
                .map(|m| m.to_f64())
                .ok_or_else(|| {
                    crate::Error::ConfigInvalid(format!("no {:?} multiplier for band {}", kind, band))
                })
        };

        match self.tenors.len() {
            0 => Err(crate::Error::ConfigInvalid("no tenors configured".into())),
            1 => read(&self.tenors[0]),
            count => {
                let last_lower = count - 2;
                let u = (seconds_to_expiry as f64).sqrt() * (count - 1) as f64 / self.max_tenor_value;
                let lower = (u.floor() as usize).min(last_lower);
                let remainder = (u - lower as f64).clamp(0.0, 1.0);

                let y1 = read(&self.tenors[lower])?;
                let y2 = read(&self.tenors[lower + 1])?;
                Ok(y1 + remainder * (y2 - y1))
            }
        }
    }
}
