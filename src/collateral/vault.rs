use crate::market_data::{OptionSeries, OptionSide};
use crate::utils::{Fixed, MAX_BPS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vault identifier assigned by the margin protocol
pub type VaultId = u64;

/// Lifecycle state as seen by the pool
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultState {
    Active,

    /// The protocol liquidated the vault; only a sweep is allowed now
    Liquidated,
}

/// Where a health factor sits relative to its bounds
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    NeedsTopUp,
    Excess,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => f.write_str("healthy"),
            HealthStatus::NeedsTopUp => f.write_str("needs top-up"),
            HealthStatus::Excess => f.write_str("excess"),
        }
    }
}

/// Target band for posted/required collateral, in bps
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthBounds {
    pub lower: u32,
    pub upper: u32,
}

impl Default for HealthBounds {
    fn default() -> Self {
        Self {
            lower: 12_000,
            upper: 13_000,
        }
    }
}

impl HealthBounds {
    pub fn new(lower: u32, upper: u32) -> crate::Result<Self> {
        let bounds = Self { lower, upper };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.lower == 0 || self.lower > self.upper {
            return Err(crate::Error::ConfigInvalid(format!(
                "health bounds must satisfy 0 < lower <= upper, got [{}, {}]",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    pub fn classify(&self, health_factor: u64) -> HealthStatus {
        if health_factor < self.lower as u64 {
            HealthStatus::NeedsTopUp
        } else if health_factor > self.upper as u64 {
            HealthStatus::Excess
        } else {
            HealthStatus::Healthy
        }
    }

    /// Collateral that puts `required` exactly at the upper bound
    pub fn target(&self, required: Fixed) -> Fixed {
        required.bps(self.upper)
    }
}

/// Health bounds per option side
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SideHealthBounds {
    pub call: HealthBounds,
    pub put: HealthBounds,
}

impl SideHealthBounds {
    pub fn get(&self, side: OptionSide) -> &HealthBounds {
        match side {
            OptionSide::Call => &self.call,
            OptionSide::Put => &self.put,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.call.validate()?;
        self.put.validate()
    }
}

/// `posted * 10000 / required`; `u64::MAX` when nothing is required
pub fn health_factor(posted: Fixed, required: Fixed) -> u64 {
    if required.raw() <= 0 {
        return u64::MAX;
    }
    let ratio = posted.raw().max(0) as i128 * MAX_BPS as i128 / required.raw() as i128;
    ratio.min(u64::MAX as i128) as u64
}

/// One short position held through the margin protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollateralVault {
    pub id: VaultId,
    pub series: OptionSeries,

    /// Contracts written out of this vault
    pub short_amount: Fixed,

    /// Collateral the pool has deposited
    pub posted: Fixed,

    pub state: VaultState,
}

impl CollateralVault {
    pub fn new(id: VaultId, series: OptionSeries) -> Self {
        Self {
            id,
            series,
            short_amount: Fixed::ZERO,
            posted: Fixed::ZERO,
            state: VaultState::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == VaultState::Active
    }
}

/// Point-in-time health of a vault
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultHealth {
    pub vault_id: VaultId,
    pub posted: Fixed,
    pub required: Fixed,
    pub health_factor: u64,
    pub status: HealthStatus,
    pub liquidatable: bool,
}
