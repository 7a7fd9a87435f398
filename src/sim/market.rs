use crate::collateral::CollateralPool;
use crate::market_data::{Asset, PriceOracle, PriceReading};
use crate::utils::Fixed;
use ahash::AHashMap;
use parking_lot::RwLock;

/// In-memory price feed
pub struct PaperPriceOracle {
    readings: RwLock<AHashMap<(Asset, Asset), PriceReading>>,
    sequencer_up: RwLock<bool>,
}

impl PaperPriceOracle {
    pub fn new() -> Self {
        Self {
            readings: RwLock::new(AHashMap::new()),
            sequencer_up: RwLock::new(true),
        }
    }

    pub fn set_price(&self, base: &Asset, quote: &Asset, price: Fixed, updated_at: u64) {
        self.readings.write().insert(
            (base.clone(), quote.clone()),
            PriceReading {
                price,
                updated_at,
                sequencer_up: true,
            },
        );
    }

    pub fn set_sequencer_up(&self, up: bool) {
        *self.sequencer_up.write() = up;
    }
}

impl Default for PaperPriceOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceOracle for PaperPriceOracle {
    fn normalized_rate(&self, base: &Asset, quote: &Asset) -> crate::Result<PriceReading> {
        let mut reading = self
            .readings
            .read()
            .get(&(base.clone(), quote.clone()))
            .copied()
            .ok_or_else(|| crate::Error::StaleOracle(format!("no price for {}/{}", base, quote)))?;
        reading.sequencer_up = *self.sequencer_up.read();
        Ok(reading)
    }
}

/// In-memory pool balance sheet
#[derive(Default)]
pub struct PaperCollateralPool {
    balances: RwLock<AHashMap<Asset, Fixed>>,
    failing: RwLock<bool>,
}

impl PaperCollateralPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, asset: &Asset, amount: Fixed) {
        self.balances.write().insert(asset.clone(), amount);
    }

    /// Make every debit and credit fail until switched back
    pub fn set_failing(&self, failing: bool) {
        *self.failing.write() = failing;
    }

    fn check_available(&self) -> crate::Result<()> {
        if *self.failing.read() {
            return Err(crate::Error::Venue("collateral pool unavailable".into()));
        }
        Ok(())
    }
}

impl CollateralPool for PaperCollateralPool {
    fn available(&self, asset: &Asset) -> Fixed {
        self.balances.read().get(asset).copied().unwrap_or(Fixed::ZERO)
    }

    fn debit(&self, asset: &Asset, amount: Fixed) -> crate::Result<()> {
        self.check_available()?;
        let mut balances = self.balances.write();
        let balance = balances.entry(asset.clone()).or_insert(Fixed::ZERO);
        if *balance < amount {
            return Err(crate::Error::InsufficientLiquidity {
                requested: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&self, asset: &Asset, amount: Fixed) -> crate::Result<()> {
        self.check_available()?;
        let mut balances = self.balances.write();
        let balance = balances.entry(asset.clone()).or_insert(Fixed::ZERO);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| crate::Error::Calculation(format!("{} balance overflow", asset)))?;
        Ok(())
    }
}
