use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Caller identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permission level
///
/// `Governor` implies `Manager`, which implies `Keeper`. `Pool` stands apart:
/// it is the liquidity pool contract itself and is the only caller allowed to
/// book trades.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Keeper,
    Manager,
    Governor,
    Pool,
}

impl Role {
    /// Whether holding `self` satisfies a requirement for `required`
    pub fn satisfies(self, required: Role) -> bool {
        match (self, required) {
            (Role::Pool, Role::Pool) => true,
            (Role::Pool, _) | (_, Role::Pool) => false,
            (held, required) => held >= required,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Keeper => f.write_str("keeper"),
            Role::Manager => f.write_str("manager"),
            Role::Governor => f.write_str("governor"),
            Role::Pool => f.write_str("pool"),
        }
    }
}

/// Role grants per account
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessControl {
    grants: BTreeMap<AccountId, BTreeSet<Role>>,
}

impl AccessControl {
    /// Access control with a single governor
    pub fn with_governor(governor: AccountId) -> Self {
        let mut access = Self::default();
        access.grants.entry(governor).or_default().insert(Role::Governor);
        access
    }

    pub fn has_role(&self, account: &AccountId, required: Role) -> bool {
        self.grants
            .get(account)
            .is_some_and(|roles| roles.iter().any(|held| held.satisfies(required)))
    }

    pub fn require(&self, account: &AccountId, required: Role) -> crate::Result<()> {
        if self.has_role(account, required) {
            Ok(())
        } else {
            Err(crate::Error::UnauthorizedCaller {
                caller: account.to_string(),
                required,
            })
        }
    }

    /// Grant `role` to `account`; only a governor may do this
    pub fn grant(&mut self, caller: &AccountId, account: AccountId, role: Role) -> crate::Result<()> {
        self.require(caller, Role::Governor)?;
        self.grants.entry(account).or_default().insert(role);
        Ok(())
    }

    /// Revoke `role` from `account`; the last governor cannot be removed
    pub fn revoke(&mut self, caller: &AccountId, account: &AccountId, role: Role) -> crate::Result<()> {
        self.require(caller, Role::Governor)?;
        if role == Role::Governor && self.governors() == 1 && self.has_role(account, Role::Governor) {
            return Err(crate::Error::InvalidState(
                "cannot revoke the last governor".into(),
            ));
        }
        if let Some(roles) = self.grants.get_mut(account) {
            roles.remove(&role);
            if roles.is_empty() {
                self.grants.remove(account);
            }
        }
        Ok(())
    }

    fn governors(&self) -> usize {
        self.grants
            .values()
            .filter(|roles| roles.contains(&Role::Governor))
            .count()
    }
}
