use crate::utils::{Fixed, get_timestamp_ns};
use serde::{Deserialize, Serialize};

/// Hedge urgency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Urgency {
    /// Normal priority
    Normal,
    /// High priority (delta several times the threshold)
    High,
    /// Emergency (delta beyond the hard limit)
    Emergency,
}

/// Keeper-facing hedge recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeRecommendation {
    /// Net portfolio delta (options plus existing hedges)
    pub portfolio_delta: Fixed,

    /// Delta to push through the reactors (always `-portfolio_delta`)
    pub target: Fixed,

    pub urgency: Urgency,

    /// Reason for hedge
    pub reason: String,

    /// Monotonic timestamp when the recommendation was made
    pub timestamp_ns: u64,
}

impl HedgeRecommendation {
    pub fn new(portfolio_delta: Fixed, urgency: Urgency, reason: String) -> Self {
        Self {
            portfolio_delta,
            target: -portfolio_delta,
            urgency,
            reason,
            timestamp_ns: get_timestamp_ns(),
        }
    }
}

/// Delta-hedging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgingConfig {
    /// Net delta (in underlying units) below which the keeper does nothing
    pub rebalance_threshold: Fixed,

    /// Unfilled delta tolerated before a rebalance is reported as failed
    pub shortfall_tolerance: Fixed,

    /// `|delta| >= threshold * multiple` is high urgency
    pub high_urgency_multiple: u32,

    /// Net delta treated as a risk-limit breach
    pub max_portfolio_delta: Fixed,
}

impl Default for HedgingConfig {
    fn default() -> Self {
        Self {
            rebalance_threshold: Fixed::from_f64(0.5),
            shortfall_tolerance: Fixed::from_f64(0.01),
            high_urgency_multiple: 5,
            max_portfolio_delta: Fixed::from_int(500),
        }
    }
}

impl HedgingConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.rebalance_threshold.is_negative() {
            return Err(crate::Error::ConfigInvalid(
                "Rebalance threshold must be non-negative".to_string(),
            ));
        }

        if self.shortfall_tolerance.is_negative() {
            return Err(crate::Error::ConfigInvalid(
                "Shortfall tolerance must be non-negative".to_string(),
            ));
        }

        if self.high_urgency_multiple == 0 {
            return Err(crate::Error::ConfigInvalid(
                "High urgency multiple must be positive".to_string(),
            ));
        }

        if !self.max_portfolio_delta.is_positive() {
            return Err(crate::Error::ConfigInvalid(
                "Max portfolio delta must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Build a recommendation for `portfolio_delta`, or `None` inside the threshold
    pub fn recommend(&self, portfolio_delta: Fixed) -> Option<HedgeRecommendation> {
        let magnitude = portfolio_delta.abs();
        if magnitude.is_zero() || magnitude < self.rebalance_threshold {
            return None;
        }

        let high = Fixed::from_raw(
            self.rebalance_threshold
                .raw()
                .saturating_mul(self.high_urgency_multiple as i64),
        );
        let urgency = if magnitude >= self.max_portfolio_delta {
            Urgency::Emergency
        } else if magnitude >= high {
            Urgency::High
        } else {
            Urgency::Normal
        };

        Some(HedgeRecommendation::new(
            portfolio_delta,
            urgency,
            format!(
                "Delta hedge: portfolio delta={:.4}, threshold={:.4}, target={:.4}",
                portfolio_delta, self.rebalance_threshold, -portfolio_delta
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(HedgingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_inside_threshold_is_ignored() {
        let config = HedgingConfig::default();
        assert!(config.recommend(Fixed::from_f64(0.2)).is_none());
        assert!(config.recommend(Fixed::ZERO).is_none());
    }

    #[test]
    fn test_urgency_levels() {
        let config = HedgingConfig::default();
        let normal = config.recommend(Fixed::ONE).unwrap();
        assert_eq!(normal.urgency, Urgency::Normal);
        assert_eq!(normal.target, -Fixed::ONE);

        assert_eq!(config.recommend(-Fixed::from_int(3)).unwrap().urgency, Urgency::High);
        assert_eq!(
            config.recommend(Fixed::from_int(600)).unwrap().urgency,
            Urgency::Emergency
        );
    }

    #[test]
    fn test_invalid_config() {
        let config = HedgingConfig {
            shortfall_tolerance: -Fixed::ONE,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
