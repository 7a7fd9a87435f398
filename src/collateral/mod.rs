//! Vault collateral tracking and health maintenance

mod monitor;
mod protocol;
mod vault;

pub use monitor::{CollateralAdjustment, CollateralHealthMonitor, MonitorState, VaultClosure};
pub use protocol::{CollateralPool, MarginProtocol, VaultStatus};
pub use vault::{
    CollateralVault, HealthBounds, HealthStatus, SideHealthBounds, VaultHealth, VaultId,
    VaultState, health_factor,
};
