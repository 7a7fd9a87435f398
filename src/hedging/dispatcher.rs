use crate::hedging::HedgingReactor;
use crate::market_data::Asset;
use crate::utils::Fixed;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One reactor's contribution to a rebalance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeFill {
    pub reactor: String,
    pub requested: Fixed,
    pub realized: Fixed,
}

/// A reactor call that failed during a rebalance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactorFailure {
    pub reactor: String,
    pub error: String,
}

/// Outcome of a best-effort rebalance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeReport {
    pub target: Fixed,
    pub realized: Fixed,
    pub fills: SmallVec<[HedgeFill; 4]>,
    pub failures: SmallVec<[ReactorFailure; 2]>,
}

impl HedgeReport {
    fn new(target: Fixed) -> Self {
        Self {
            target,
            realized: Fixed::ZERO,
            fills: SmallVec::new(),
            failures: SmallVec::new(),
        }
    }

    /// Delta left unfilled (same sign as the target)
    pub fn shortfall(&self) -> Fixed {
        self.target - self.realized
    }

    pub fn is_complete(&self) -> bool {
        self.shortfall().is_zero()
    }
}

/// Registry entry as persisted (reactor order and enabled flags)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactorRegistration {
    pub name: String,
    pub enabled: bool,
}

struct Registration {
    enabled: bool,
    reactor: Box<dyn HedgingReactor>,
}

/// Ordered registry of hedging reactors
///
/// A rebalance walks the enabled reactors in order, handing each the delta
/// still outstanding, and stops as soon as nothing remains. A reactor that
/// errors is skipped.
#[derive(Default)]
pub struct HedgeDispatcher {
    reactors: Vec<Registration>,
    hedged_delta: Fixed,
}

impl HedgeDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative delta realized through this dispatcher
    pub fn hedged_delta(&self) -> Fixed {
        self.hedged_delta
    }

    /// Delta currently held across all reactors, enabled or not
    pub fn reactor_delta(&self) -> Fixed {
        self.reactors.iter().map(|r| r.reactor.delta()).sum()
    }

    pub fn len(&self) -> usize {
        self.reactors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactors.is_empty()
    }

    pub fn registrations(&self) -> Vec<ReactorRegistration> {
        self.reactors
            .iter()
            .map(|r| ReactorRegistration {
                name: r.reactor.name().to_string(),
                enabled: r.enabled,
            })
            .collect()
    }

    pub fn reactor(&self, name: &str) -> Option<&dyn HedgingReactor> {
        self.position(name).map(|i| self.reactors[i].reactor.as_ref())
    }

    /// Append a reactor, enabled, at the end of the order
    pub fn register(&mut self, reactor: Box<dyn HedgingReactor>) -> crate::Result<()> {
        if self.position(reactor.name()).is_some() {
            return Err(crate::Error::ConfigInvalid(format!(
                "reactor {} is already registered",
                reactor.name()
            )));
        }
        info!("registered hedging reactor {}", reactor.name());
        self.reactors.push(Registration {
            enabled: true,
            reactor,
        });
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> crate::Result<Box<dyn HedgingReactor>> {
        let index = self.require(name)?;
        let removed = self.reactors.remove(index);
        if !removed.reactor.delta().is_zero() {
            warn!(
                "removed reactor {} still holds delta {}",
                name,
                removed.reactor.delta()
            );
        }
        Ok(removed.reactor)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> crate::Result<()> {
        let index = self.require(name)?;
        self.reactors[index].enabled = enabled;
        info!("reactor {} {}", name, if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Reorder the registry; `order` must name every reactor exactly once
    pub fn reorder(&mut self, order: &[String]) -> crate::Result<()> {
        if order.len() != self.reactors.len() {
            return Err(crate::Error::ConfigInvalid(format!(
                "reorder names {} reactors, registry has {}",
                order.len(),
                self.reactors.len()
            )));
        }

        let mut indices = Vec::with_capacity(order.len());
        for name in order {
            let index = self.require(name)?;
            if indices.contains(&index) {
                return Err(crate::Error::ConfigInvalid(format!(
                    "reactor {} appears twice in the new order",
                    name
                )));
            }
            indices.push(index);
        }

        let mut slots: Vec<Option<Registration>> = self.reactors.drain(..).map(Some).collect();
        self.reactors = indices
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
        Ok(())
    }

    /// Apply persisted order and flags to the reactors that are registered
    ///
    /// Reactors missing from `registrations` keep their relative order after
    /// the listed ones.
    pub fn apply_registrations(&mut self, registrations: &[ReactorRegistration]) {
        let mut ordered = Vec::with_capacity(self.reactors.len());
        for registration in registrations {
            if let Some(index) = self.position(&registration.name) {
                let mut entry = self.reactors.remove(index);
                entry.enabled = registration.enabled;
                ordered.push(entry);
            } else {
                warn!("persisted reactor {} is not registered", registration.name);
            }
        }
        ordered.append(&mut self.reactors);
        self.reactors = ordered;
    }

    /// Push `target` delta through the enabled reactors
    pub fn rebalance(&mut self, target: Fixed) -> HedgeReport {
        let mut report = HedgeReport::new(target);
        let mut remaining = target;

        for registration in self.reactors.iter_mut().filter(|r| r.enabled) {
            if remaining.is_zero() {
                break;
            }

            let name = registration.reactor.name().to_string();
            match registration.reactor.hedge_delta(remaining) {
                Ok(realized) => {
                    remaining -= realized;
                    report.realized += realized;
                    report.fills.push(HedgeFill {
                        reactor: name,
                        requested: remaining + realized,
                        realized,
                    });
                }
                Err(e) => {
                    warn!("reactor {} failed to hedge {}: {}", name, remaining, e);
                    report.failures.push(ReactorFailure {
                        reactor: name,
                        error: e.to_string(),
                    });
                }
            }
        }

        self.hedged_delta += report.realized;
        debug!(
            "rebalance target {} realized {} shortfall {}",
            target,
            report.realized,
            report.shortfall()
        );
        report
    }

    /// Value held across every reactor, in pool collateral
    pub fn pool_denominated_value(&self) -> crate::Result<Fixed> {
        let mut total = Fixed::ZERO;
        for registration in &self.reactors {
            total += registration.reactor.pool_denominated_value()?;
        }
        Ok(total)
    }

    /// Pull up to `amount` of `asset` back from the reactors in order
    pub fn withdraw(&mut self, amount: Fixed, asset: &Asset) -> Fixed {
        let mut released = Fixed::ZERO;
        for registration in self.reactors.iter_mut() {
            let outstanding = amount - released;
            if !outstanding.is_positive() {
                break;
            }
            match registration.reactor.withdraw(outstanding, asset) {
                Ok(got) => released += got,
                Err(e) => warn!(
                    "reactor {} withdraw of {} failed: {}",
                    registration.reactor.name(),
                    outstanding,
                    e
                ),
            }
        }
        released
    }

    /// Hand `amount` of `asset` to the named reactor, enabled or not
    pub fn fund(&mut self, name: &str, amount: Fixed, asset: &Asset) -> crate::Result<()> {
        let index = self.require(name)?;
        self.reactors[index].reactor.fund(amount, asset)?;
        info!("funded reactor {} with {} {}", name, amount, asset);
        Ok(())
    }

    /// Re-sync every reactor's collateral; returns each reactor's result
    pub fn update_all(&mut self) -> Vec<(String, crate::Result<Fixed>)> {
        self.reactors
            .iter_mut()
            .map(|registration| {
                let name = registration.reactor.name().to_string();
                let result = registration.reactor.update();
                if let Err(e) = &result {
                    warn!("reactor {} update failed: {}", name, e);
                }
                (name, result)
            })
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.reactors.iter().position(|r| r.reactor.name() == name)
    }

    fn require(&self, name: &str) -> crate::Result<usize> {
        self.position(name)
            .ok_or_else(|| crate::Error::ConfigInvalid(format!("no reactor named {}", name)))
    }
}
