//! Magnitude-dependent acceptance thresholds.
//!
//! Larger events carry more low-frequency energy and tolerate looser
//! timing, so the frequency band, delta-sp limit, and required station
//! count all step with magnitude. The policy is a piecewise-constant
//! lookup over an ordered rule list, evaluated on the larger magnitude of
//! an event pair.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One magnitude bucket: applies to magnitudes up to `max_magnitude`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Upper magnitude boundary of this bucket (inclusive).
    pub max_magnitude: f64,
    /// Low corner of the analysis band in Hz.
    pub band_low_hz: f64,
    /// High corner of the analysis band in Hz.
    pub band_high_hz: f64,
    /// Maximum |delta-sp| in seconds for a station to be accepted.
    pub delta_sp_max: f64,
    /// Minimum accepted stations for the pair to count as similar.
    pub min_stations: usize,
}

impl ThresholdRule {
    /// The analysis frequency band as (low, high) in Hz.
    pub fn band(&self) -> (f64, f64) {
        (self.band_low_hz, self.band_high_hz)
    }
}

/// Ill-formed rule lists are configuration errors, fatal at load time.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("threshold rule list is empty")]
    Empty,

    #[error("rule boundaries must be strictly ascending: {previous} then {current}")]
    UnorderedBoundaries { previous: f64, current: f64 },

    #[error("rule for magnitude <= {max_magnitude} has an empty band {low_hz}-{high_hz} Hz")]
    EmptyBand {
        max_magnitude: f64,
        low_hz: f64,
        high_hz: f64,
    },

    #[error("rule for magnitude <= {max_magnitude} has non-positive delta_sp_max {delta_sp_max}")]
    NonPositiveDeltaSp {
        max_magnitude: f64,
        delta_sp_max: f64,
    },
}

/// Piecewise-constant magnitude lookup over a validated rule list.
#[derive(Debug, Clone)]
pub struct ThresholdPolicy {
    rules: Vec<ThresholdRule>,
}

impl ThresholdPolicy {
    /// Validate and take ownership of an ordered rule list.
    pub fn from_rules(rules: Vec<ThresholdRule>) -> Result<Self, RuleError> {
        if rules.is_empty() {
            return Err(RuleError::Empty);
        }
        for pair in rules.windows(2) {
            if pair[1].max_magnitude <= pair[0].max_magnitude {
                return Err(RuleError::UnorderedBoundaries {
                    previous: pair[0].max_magnitude,
                    current: pair[1].max_magnitude,
                });
            }
        }
        for rule in &rules {
            if rule.band_high_hz <= rule.band_low_hz || rule.band_low_hz < 0.0 {
                return Err(RuleError::EmptyBand {
                    max_magnitude: rule.max_magnitude,
                    low_hz: rule.band_low_hz,
                    high_hz: rule.band_high_hz,
                });
            }
            if !(rule.delta_sp_max > 0.0) {
                return Err(RuleError::NonPositiveDeltaSp {
                    max_magnitude: rule.max_magnitude,
                    delta_sp_max: rule.delta_sp_max,
                });
            }
        }
        Ok(Self { rules })
    }

    /// The rule whose boundary is the tightest one not exceeded by the
    /// magnitude. Magnitudes above every boundary take the last rule, so
    /// the lookup is total.
    pub fn rule_for(&self, magnitude: f64) -> &ThresholdRule {
        self.rules
            .iter()
            .find(|rule| magnitude <= rule.max_magnitude)
            .unwrap_or_else(|| &self.rules[self.rules.len() - 1])
    }

    /// The validated rules, in ascending boundary order.
    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(max_magnitude: f64, low: f64, high: f64) -> ThresholdRule {
        ThresholdRule {
            max_magnitude,
            band_low_hz: low,
            band_high_hz: high,
            delta_sp_max: 0.05,
            min_stations: 2,
        }
    }

    fn policy() -> ThresholdPolicy {
        ThresholdPolicy::from_rules(vec![
            rule(2.0, 2.0, 10.0),
            rule(3.5, 1.0, 8.0),
            rule(9.0, 0.5, 5.0),
        ])
        .unwrap()
    }

    #[test]
    fn rule_for_picks_tightest_boundary() {
        let p = policy();
        assert_eq!(p.rule_for(1.2).max_magnitude, 2.0);
        assert_eq!(p.rule_for(2.0).max_magnitude, 2.0);
        assert_eq!(p.rule_for(2.1).max_magnitude, 3.5);
        assert_eq!(p.rule_for(5.0).max_magnitude, 9.0);
    }

    #[test]
    fn magnitude_above_all_boundaries_takes_last_rule() {
        let p = policy();
        assert_eq!(p.rule_for(9.5).max_magnitude, 9.0);
    }

    #[test]
    fn empty_rule_list_is_rejected() {
        assert!(matches!(
            ThresholdPolicy::from_rules(vec![]),
            Err(RuleError::Empty)
        ));
    }

    #[test]
    fn unordered_boundaries_are_rejected() {
        let err = ThresholdPolicy::from_rules(vec![rule(3.0, 1.0, 8.0), rule(2.0, 2.0, 10.0)]);
        assert!(matches!(err, Err(RuleError::UnorderedBoundaries { .. })));
    }

    #[test]
    fn inverted_band_is_rejected() {
        let err = ThresholdPolicy::from_rules(vec![rule(2.0, 10.0, 2.0)]);
        assert!(matches!(err, Err(RuleError::EmptyBand { .. })));
    }
}
