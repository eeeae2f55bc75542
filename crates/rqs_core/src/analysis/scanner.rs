//! Whole-catalogue scan across unordered event pairs.
//!
//! Pairs are independent: each one reads the shared immutable catalogue
//! and works on private trace copies, so the scan parallelizes across
//! pairs with no cross-pair state. Collecting the summaries is the
//! synchronization point; families are defined over the complete edge
//! set, so connectivity runs only after every pair has finished.

use rayon::prelude::*;

use crate::config::Settings;
use crate::families::{build_families, Family};
use crate::models::Event;
use crate::providers::{PickProvider, WaveformSource};

use super::pair::PairAnalyzer;
use super::thresholds::{RuleError, ThresholdPolicy};
use super::types::PairSummary;

/// Outcome of a full catalogue scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Pairs with at least one accepted station, in pair-key order.
    pub pairs: Vec<PairSummary>,
    /// Connected families over the qualifying pairs.
    pub families: Vec<Family>,
}

/// Runs the pairwise analysis over a catalogue.
pub struct Scanner<'a> {
    settings: &'a Settings,
    policy: ThresholdPolicy,
    picks: &'a dyn PickProvider,
    waveforms: &'a dyn WaveformSource,
}

impl<'a> Scanner<'a> {
    /// Build a scanner, validating the threshold rules.
    pub fn new(
        settings: &'a Settings,
        picks: &'a dyn PickProvider,
        waveforms: &'a dyn WaveformSource,
    ) -> Result<Self, RuleError> {
        let policy = ThresholdPolicy::from_rules(settings.thresholds.clone())?;
        Ok(Self {
            settings,
            policy,
            picks,
            waveforms,
        })
    }

    /// Analyze every unordered pair of catalogue events and group the
    /// qualifying ones into families.
    pub fn scan(&self, catalogue: &[Event]) -> ScanResult {
        let n = catalogue.len();
        let mut pair_indices = Vec::with_capacity(n.saturating_sub(1) * n / 2);
        for i in 0..n {
            for j in i + 1..n {
                pair_indices.push((i, j));
            }
        }
        tracing::info!(
            events = n,
            pairs = pair_indices.len(),
            "scanning catalogue for repeaters"
        );

        let analyzer = PairAnalyzer::new(&self.settings.analysis, self.picks, self.waveforms);
        let mut pairs: Vec<PairSummary> = pair_indices
            .par_iter()
            .map(|&(i, j)| {
                let a = &catalogue[i];
                let b = &catalogue[j];
                let rule = self.policy.rule_for(a.magnitude.max(b.magnitude));
                analyzer.analyze_pair(a, b, rule)
            })
            .filter(|summary| !summary.stations.is_empty())
            .collect();
        // Parallel collection order is nondeterministic; reports are not.
        pairs.sort_by(|x, y| x.pair.cmp(&y.pair));

        let families = build_families(&pairs);
        tracing::info!(
            pairs = pairs.len(),
            families = families.len(),
            "scan complete"
        );

        ScanResult { pairs, families }
    }
}
