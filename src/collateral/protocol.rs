use crate::collateral::VaultId;
use crate::market_data::{Asset, OptionSeries};
use crate::utils::Fixed;

/// The margin protocol's view of a vault
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VaultStatus {
    pub posted: Fixed,
    pub short_amount: Fixed,
    pub liquidated: bool,
}

/// External settlement/margin protocol holding the pool's vaults
///
/// Calls are synchronous and may fail; a failure leaves the protocol's state
/// unchanged.
pub trait MarginProtocol: Send + Sync {
    fn open_vault(&self, series: &OptionSeries) -> crate::Result<VaultId>;

    fn deposit_collateral(&self, vault: VaultId, amount: Fixed) -> crate::Result<()>;

    fn withdraw_collateral(&self, vault: VaultId, amount: Fixed) -> crate::Result<()>;

    /// Write `amount` more contracts against the vault's collateral
    fn mint_short(&self, vault: VaultId, amount: Fixed) -> crate::Result<()>;

    fn burn_short(&self, vault: VaultId, amount: Fixed) -> crate::Result<()>;

    /// Settle an expired vault; returns the collateral handed back
    fn settle_vault(&self, vault: VaultId) -> crate::Result<Fixed>;

    /// Redeem `amount` expired long contracts of `series`; returns the
    /// cash-settled payout in the series' collateral asset
    fn redeem_long(&self, series: &OptionSeries, amount: Fixed) -> crate::Result<Fixed>;

    fn vault_status(&self, vault: VaultId) -> crate::Result<VaultStatus>;

    /// Pull whatever collateral a liquidation left behind
    fn reclaim_residual(&self, vault: VaultId) -> crate::Result<Fixed>;

    /// Collateral required to write `amount` contracts of `series` at `spot`
    fn naked_margin_required(
        &self,
        series: &OptionSeries,
        amount: Fixed,
        spot: Fixed,
    ) -> crate::Result<Fixed>;

    fn is_liquidatable(&self, vault: VaultId) -> crate::Result<bool>;
}

/// The pool's free collateral balance
pub trait CollateralPool: Send + Sync {
    fn available(&self, asset: &Asset) -> Fixed;

    fn debit(&self, asset: &Asset, amount: Fixed) -> crate::Result<()>;

    fn credit(&self, asset: &Asset, amount: Fixed) -> crate::Result<()>;
}
