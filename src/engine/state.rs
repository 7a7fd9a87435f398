use crate::collateral::MonitorState;
use crate::engine::{AccessControl, EngineConfig};
use crate::hedging::ReactorRegistration;
use crate::pricing::VolatilityModel;
use crate::risk::{LedgerEntry, TrackerState};
use serde::{Deserialize, Serialize};

/// Bumped whenever the persisted layout changes
pub const STATE_VERSION: u32 = 1;

/// Everything the engine persists between runs
///
/// Reactors are live adapters and are not persisted; only their order and
/// enabled flags are, and are re-applied when the reactors are registered
/// again on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub version: u32,
    pub config: EngineConfig,
    pub volatility: VolatilityModel,
    pub tracker: TrackerState,
    pub collateral: MonitorState,

    /// Long options the pool bought from users, per series
    pub inventory: Vec<LedgerEntry>,

    pub reactors: Vec<ReactorRegistration>,
    pub access: AccessControl,
}

impl EngineState {
    /// Compact binary encoding
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let state: Self =
            bincode::deserialize(bytes).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        state.check_version()?;
        Ok(state)
    }

    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        let state: Self =
            serde_json::from_str(json).map_err(|e| crate::Error::Serialization(e.to_string()))?;
        state.check_version()?;
        Ok(state)
    }

    fn check_version(&self) -> crate::Result<()> {
        if self.version != STATE_VERSION {
            return Err(crate::Error::Serialization(format!(
                "state version {} is not supported (expected {})",
                self.version, STATE_VERSION
            )));
        }
        Ok(())
    }
}
