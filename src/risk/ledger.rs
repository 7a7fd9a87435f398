use crate::market_data::{OptionSeries, OptionSide, SeriesKey};
use crate::risk::tracker::position_delta;
use crate::risk::{DeltaContext, RiskTracker, TrackerMode, TrackerState};
use crate::utils::Fixed;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One persisted ledger row
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub series: SeriesKey,
    pub amount: Fixed,
}

/// Exact per-series position ledger
///
/// Keeps the signed net amount of every open series. Delta is the exact sum
/// over series; iteration follows key order so repeated reads agree bit for
/// bit. Expired series stay on the books at intrinsic delta until they are
/// settled and booked out.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<LedgerEntry>", into = "Vec<LedgerEntry>")]
pub struct PositionLedger {
    positions: BTreeMap<SeriesKey, Fixed>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self, key: &SeriesKey) -> Fixed {
        self.positions.get(key).copied().unwrap_or(Fixed::ZERO)
    }

    /// Number of series with a non-zero position
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &Fixed)> {
        self.positions.iter()
    }
}

impl From<Vec<LedgerEntry>> for PositionLedger {
    fn from(entries: Vec<LedgerEntry>) -> Self {
        let positions = entries
            .into_iter()
            .filter(|entry| !entry.amount.is_zero())
            .map(|entry| (entry.series, entry.amount))
            .collect();
        Self { positions }
    }
}

impl From<PositionLedger> for Vec<LedgerEntry> {
    fn from(ledger: PositionLedger) -> Self {
        ledger
            .positions
            .into_iter()
            .map(|(series, amount)| LedgerEntry { series, amount })
            .collect()
    }
}

impl RiskTracker for PositionLedger {
    fn mode(&self) -> TrackerMode {
        TrackerMode::Ledger
    }

    fn record_trade(&mut self, series: &OptionSeries, amount: Fixed) -> crate::Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let key = series.key();
        let updated = self.position(&key).checked_add(amount).ok_or_else(|| {
            crate::Error::Calculation(format!("position overflow on {}", series))
        })?;

        if updated.is_zero() {
            self.positions.remove(&key);
        } else {
            self.positions.insert(key, updated);
        }
        Ok(())
    }

    fn net_exposure(&self, series: &OptionSeries) -> Fixed {
        self.position(&series.key())
    }

    fn side_exposure(&self, side: OptionSide) -> Fixed {
        self.positions
            .iter()
            .filter(|(key, _)| key.is_put == side.is_put())
            .map(|(_, amount)| *amount)
            .sum()
    }

    fn portfolio_delta(&self, ctx: &DeltaContext<'_>) -> crate::Result<Fixed> {
        let mut delta = Fixed::ZERO;
        for (key, amount) in &self.positions {
            delta += position_delta(
                ctx,
                OptionSide::from_is_put(key.is_put),
                key.strike,
                key.expiration,
                *amount,
            )?;
        }
        Ok(delta)
    }

    fn snapshot(&self) -> TrackerState {
        TrackerState::Ledger(self.clone())
    }
}
