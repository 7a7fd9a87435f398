use crate::market_data::{OptionSeries, OptionSide};
use crate::pricing::{self, VolatilitySource};
use crate::quoting::{FeeBreakdown, MultiplierKind, PricingParams, Quote};
use crate::utils::{Fixed, MAX_BPS, years_until};
use log::debug;

/// Everything a quote depends on besides the pricing parameters
#[derive(Debug, Clone, Copy)]
pub struct QuoteInputs<'a> {
    pub series: &'a OptionSeries,
    pub amount: Fixed,
    pub is_sell: bool,
    pub spot: Fixed,
    pub now: u64,
    pub risk_free_rate: f64,

    /// Pool exposure already filled (positive = pool long); drives slippage
    pub net_exposure: Fixed,

    /// Long contracts of this exact series the pool holds; a buy delivers
    /// these before writing new ones
    pub covered_inventory: Fixed,

    /// Collateral one newly written contract locks up
    pub margin_per_contract: Fixed,
}

/// Turns vanilla prices into transactable premiums
///
/// Pure: the same parameters and inputs always give the same quote.
#[derive(Debug, Clone)]
pub struct QuoteEngine {
    params: PricingParams,
}

impl QuoteEngine {
    pub fn new(params: PricingParams) -> crate::Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &PricingParams {
        &self.params
    }

    /// Replace the parameters; the old ones stay in force if validation fails
    pub fn set_params(&mut self, params: PricingParams) -> crate::Result<()> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    pub fn quote(
        &self,
        inputs: &QuoteInputs<'_>,
        volatility: &dyn VolatilitySource,
    ) -> crate::Result<Quote> {
        let QuoteInputs {
            series,
            amount,
            is_sell,
            spot,
            now,
            risk_free_rate,
            net_exposure,
            covered_inventory,
            margin_per_contract,
        } = *inputs;

        if !amount.is_positive() {
            return Err(crate::Error::BoundsViolation(format!(
                "quote amount must be positive, got {}",
                amount
            )));
        }
        if series.is_expired(now) {
            return Err(crate::Error::BoundsViolation(format!(
                "series {} expired at {}",
                series, series.expiration
            )));
        }

        let side = series.side();
        let iv = volatility.implied_volatility(side, spot, series.strike, series.expiration, now)?;
        if !iv.is_finite() || iv < 0.0 {
            return Err(crate::Error::ConfigInvalid(format!(
                "implied volatility {} for {} is not quotable",
                iv, series
            )));
        }

        let seconds_to_expiry = series.expiration - now;
        let time_years = years_until(series.expiration, now);
        let vanilla = pricing::price(
            spot.to_f64(),
            series.strike.to_f64(),
            time_years,
            iv,
            risk_free_rate,
            side.is_put(),
        );

        let amount_f = amount.to_f64();
        let base = vanilla.price * amount_f;
        let band = self.params.band_index(vanilla.delta);

        let slippage = self.slippage_multiplier(
            side,
            band,
            amount_f,
            net_exposure.to_f64(),
            is_sell,
            seconds_to_expiry,
        )?;
        let slipped = base * slippage;
        let spread = slipped * self.params.bid_ask_spread_bps as f64 / MAX_BPS as f64;

        let collateral_cost = if is_sell {
            0.0
        } else {
            self.collateral_cost(
                side,
                band,
                amount,
                covered_inventory,
                margin_per_contract,
                time_years,
                seconds_to_expiry,
            )?
        };

        let delta_financing = self.delta_financing(
            side,
            band,
            vanilla.delta,
            amount_f,
            spot.to_f64(),
            is_sell,
            time_years,
            seconds_to_expiry,
        )?;

        let base_fixed = Fixed::try_from_f64(base)?;
        let fees = FeeBreakdown {
            base: base_fixed,
            slippage: Fixed::try_from_f64(slipped)? - base_fixed,
            spread: Fixed::try_from_f64(spread)?,
            collateral_cost: Fixed::try_from_f64(collateral_cost)?,
            delta_financing: Fixed::try_from_f64(delta_financing)?,
        };
        let premium = fees.unclamped_premium(is_sell).floor_zero();

        debug!(
            "quote {} {} x{}: iv={:.4} delta={:.4} band={} slip={:.6} premium={}",
            if is_sell { "sell" } else { "buy" },
            series,
            amount,
            iv,
            vanilla.delta,
            band,
            slippage,
            premium
        );

        Ok(Quote {
            series: series.clone(),
            amount,
            is_sell,
            premium,
            fees,
            total_delta: Fixed::try_from_f64(vanilla.delta * amount_f)?,
            iv,
            spot,
            quoted_at: now,
        })
    }

    /// Average price factor over the fill path
    ///
    /// Each contract filled moves pool exposure by one unit (down for a user
    /// buy, up for a user sell) and is priced at `(1+g)^(−x)`; the average
    /// over `[x0, x1]` has the closed form used here.
    pub fn slippage_multiplier(
        &self,
        side: OptionSide,
        band: usize,
        amount: f64,
        exposure: f64,
        is_sell: bool,
        seconds_to_expiry: u64,
    ) -> crate::Result<f64> {
        if self.params.slippage_gradient.is_zero() {
            return Ok(1.0);
        }

        let band_multiplier = self.params.interpolated_multiplier(
            MultiplierKind::Slippage,
            side,
            band,
            seconds_to_expiry,
        )?;
        let gradient = self.params.slippage_gradient.to_f64() * band_multiplier;
        if gradient == 0.0 {
            return Ok(1.0);
        }

        let log_factor = gradient.ln_1p();
        let old_exposure = exposure;
        let new_exposure = if is_sell {
            exposure + amount
        } else {
            exposure - amount
        };

        let at = |x: f64| (-x * log_factor).exp();
        let multiplier = if is_sell {
            (at(old_exposure) - at(new_exposure)) / log_factor / amount
        } else {
            (at(new_exposure) - at(old_exposure)) / log_factor / amount
        };

        if !multiplier.is_finite() {
            return Err(crate::Error::Calculation(format!(
                "slippage overflow at exposure {} amount {}",
                exposure, amount
            )));
        }
        Ok(multiplier)
    }

    /// Cost of borrowing the collateral the trade's new short locks up
    #[allow(clippy::too_many_arguments)]
    pub fn collateral_cost(
        &self,
        side: OptionSide,
        band: usize,
        amount: Fixed,
        covered: Fixed,
        margin_per_contract: Fixed,
        time_years: f64,
        seconds_to_expiry: u64,
    ) -> crate::Result<f64> {
        let newly_short = amount.saturating_sub(covered.floor_zero()).floor_zero();
        if newly_short.is_zero() {
            return Ok(0.0);
        }

        let margin = margin_per_contract.to_f64() * newly_short.to_f64();
        let growth = compounded(self.params.collateral_lending_rate_bps, time_years);
        let multiplier = self.params.interpolated_multiplier(
            MultiplierKind::Collateral,
            side,
            band,
            seconds_to_expiry,
        )?;
        Ok(margin * growth * multiplier)
    }

    /// Financing cost of the hedge the pool puts on against this trade
    #[allow(clippy::too_many_arguments)]
    pub fn delta_financing(
        &self,
        side: OptionSide,
        band: usize,
        unit_delta: f64,
        amount: f64,
        spot: f64,
        is_sell: bool,
        time_years: f64,
        seconds_to_expiry: u64,
    ) -> crate::Result<f64> {
        let dollar_delta = unit_delta.abs() * amount * spot;
        let rate = self.params.delta_borrow_rates.rate_bps(side, is_sell);
        let multiplier = self.params.interpolated_multiplier(
            MultiplierKind::Delta,
            side,
            band,
            seconds_to_expiry,
        )?;
        Ok(dollar_delta * compounded(rate, time_years) * multiplier)
    }
}

/// `(1 + r)^t − 1` for an annual rate in bps
fn compounded(rate_bps: u32, time_years: f64) -> f64 {
    let r = rate_bps as f64 / MAX_BPS as f64;
    (r.ln_1p() * time_years.max(0.0)).exp_m1()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Asset;
    use crate::pricing::VolatilitySurface;
    use crate::quoting::TenorParams;
    use approx::assert_relative_eq;

    const NOW: u64 = 1_700_000_000;
    const MONTH: u64 = 30 * 86_400;

    fn series(is_put: bool) -> OptionSeries {
        OptionSeries::new(
            NOW + MONTH,
            Fixed::from_int(2500),
            is_put,
            Asset::new("WETH"),
            Asset::new("USDC"),
            Asset::new("USDC"),
        )
    }

    fn inputs<'a>(series: &'a OptionSeries, amount: i64, is_sell: bool, exposure: i64) -> QuoteInputs<'a> {
        QuoteInputs {
            series,
            amount: Fixed::from_int(amount),
            is_sell,
            spot: Fixed::from_int(2500),
            now: NOW,
            risk_free_rate: 0.0,
            net_exposure: Fixed::from_int(exposure),
            covered_inventory: Fixed::from_int(exposure.max(0)),
            margin_per_contract: Fixed::from_int(500),
        }
    }

    #[test]
    fn test_zero_gradient_means_no_slippage() {
        let engine = QuoteEngine::new(PricingParams {
            slippage_gradient: Fixed::ZERO,
            ..Default::default()
        })
        .unwrap();
        let m = engine
            .slippage_multiplier(OptionSide::Call, 2, 5.0, -20.0, false, MONTH)
            .unwrap();
        assert_eq!(m, 1.0);
    }

    #[test]
    fn test_slippage_matches_closed_form() {
        let engine = QuoteEngine::new(PricingParams {
            slippage_gradient: Fixed::from_f64(0.01),
            tenors: vec![TenorParams::uniform(5, Fixed::ONE)],
            ..Default::default()
        })
        .unwrap();

        let m = engine
            .slippage_multiplier(OptionSide::Call, 0, 10.0, 100.0, true, MONTH)
            .unwrap();
        let ln = 1.01f64.ln();
        let expected = (1.01f64.powf(-100.0) - 1.01f64.powf(-110.0)) / ln / 10.0;
        assert_relative_eq!(m, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_buy_sell_bracket_vanilla() {
        let engine = QuoteEngine::new(PricingParams::default()).unwrap();
        let surface = VolatilitySurface::flat(0.7);
        let s = series(false);

        let buy = engine.quote(&inputs(&s, 3, false, 0), &surface).unwrap();
        let sell = engine.quote(&inputs(&s, 3, true, 0), &surface).unwrap();

        assert!(sell.premium <= sell.fees.base);
        assert!(buy.fees.base <= buy.premium);
        assert_eq!(buy.fees.base, sell.fees.base);
    }

    #[test]
    fn test_short_exposure_raises_buy_premium() {
        let engine = QuoteEngine::new(PricingParams::default()).unwrap();
        let surface = VolatilitySurface::flat(0.7);
        let s = series(true);

        let flat = engine.quote(&inputs(&s, 1, false, 0), &surface).unwrap();
        let short = engine.quote(&inputs(&s, 1, false, -50), &surface).unwrap();
        assert!(short.premium > flat.premium);
    }

    #[test]
    fn test_collateral_cost_skips_covered_contracts() {
        let engine = QuoteEngine::new(PricingParams::default()).unwrap();
        let t = years_until(NOW + MONTH, NOW);
        let amount = Fixed::from_int(3);

        let covered = engine
            .collateral_cost(OptionSide::Call, 2, amount, Fixed::from_int(5), Fixed::from_int(500), t, MONTH)
            .unwrap();
        assert_eq!(covered, 0.0);

        let partial = engine
            .collateral_cost(OptionSide::Call, 2, amount, Fixed::from_int(2), Fixed::from_int(500), t, MONTH)
            .unwrap();
        let full = engine
            .collateral_cost(OptionSide::Call, 2, amount, Fixed::ZERO, Fixed::from_int(500), t, MONTH)
            .unwrap();
        assert_relative_eq!(partial * 3.0, full, max_relative = 1e-12);
    }

    #[test]
    fn test_side_exposure_does_not_waive_collateral() {
        let engine = QuoteEngine::new(PricingParams::default()).unwrap();
        let surface = VolatilitySurface::flat(0.8);
        let s = series(false);

        // Pool long elsewhere on the call side but holds none of this series
        let mut long_elsewhere = inputs(&s, 5, false, 10);
        long_elsewhere.covered_inventory = Fixed::ZERO;
        let quote = engine.quote(&long_elsewhere, &surface).unwrap();
        assert!(quote.fees.collateral_cost.is_positive());

        let held = engine.quote(&inputs(&s, 5, false, 10), &surface).unwrap();
        assert!(held.fees.collateral_cost.is_zero());
    }

    #[test]
    fn test_rejections() {
        let engine = QuoteEngine::new(PricingParams::default()).unwrap();
        let surface = VolatilitySurface::flat(0.7);
        let s = series(false);

        let zero = engine.quote(&inputs(&s, 0, false, 0), &surface);
        assert!(matches!(zero, Err(crate::Error::BoundsViolation(_))));

        let mut expired = inputs(&s, 1, false, 0);
        expired.now = s.expiration;
        assert!(matches!(
            engine.quote(&expired, &surface),
            Err(crate::Error::BoundsViolation(_))
        ));

        let negative = VolatilitySurface::flat(-0.3);
        assert!(matches!(
            engine.quote(&inputs(&s, 1, false, 0), &negative),
            Err(crate::Error::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_invalid_params_keep_previous() {
        let mut engine = QuoteEngine::new(PricingParams::default()).unwrap();
        let bad = PricingParams {
            delta_band_width: 7,
            ..Default::default()
        };
        assert!(engine.set_params(bad).is_err());
        assert_eq!(engine.params().delta_band_width, 20);
    }

    #[test]
    fn test_quote_is_deterministic() {
        let engine = QuoteEngine::new(PricingParams::default()).unwrap();
        let surface = VolatilitySurface::flat(0.9);
        let s = series(true);
        let a = engine.quote(&inputs(&s, 4, false, -3), &surface).unwrap();
        let b = engine.quote(&inputs(&s, 4, false, -3), &surface).unwrap();
        assert_eq!(a, b);
    }
}
