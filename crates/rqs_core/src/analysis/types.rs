//! Core types for pairwise similarity analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{seconds_between, PairId, PhaseKind, StationKey};

/// A single-channel waveform trace.
///
/// Traces are mutated in place during trimming, filtering, and shifting.
/// Every analysis branch (full-window, P-window, S-window) must work on its
/// own clone; the analysis never mutates a trace another branch can see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Time of the first sample.
    pub start_time: DateTime<Utc>,
    /// Sample buffer.
    pub samples: Vec<f64>,
}

impl Trace {
    /// Sample interval in seconds.
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the trace holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Station key of this trace.
    pub fn station_key(&self) -> StationKey {
        StationKey::new(self.network.clone(), self.station.clone())
    }

    /// Offset of an absolute time from the trace start, in seconds.
    pub fn offset_of(&self, time: DateTime<Utc>) -> f64 {
        seconds_between(time, self.start_time)
    }

    /// Restrict the trace to `[reference - pre, reference + post)` seconds
    /// relative to the trace start, zero-filling any portion that extends
    /// beyond the original bounds. The start time follows the window.
    pub fn trim_around(&mut self, reference_secs: f64, pre_secs: f64, post_secs: f64) {
        let rate = self.sample_rate;
        let n_pre = (pre_secs * rate).round() as i64;
        let n_post = (post_secs * rate).round() as i64;
        let start = (reference_secs * rate).round() as i64 - n_pre;
        let len = (n_pre + n_post).max(0) as usize;

        let mut windowed = vec![0.0; len];
        for (k, slot) in windowed.iter_mut().enumerate() {
            let src = start + k as i64;
            if src >= 0 && (src as usize) < self.samples.len() {
                *slot = self.samples[src as usize];
            }
        }

        self.samples = windowed;
        let shift_ns = (start as f64 / rate * 1e9).round() as i64;
        self.start_time += chrono::Duration::nanoseconds(shift_ns);
    }

    /// Shift the sample content by `shift` samples, preserving length.
    ///
    /// A positive shift advances the trace (drops leading samples and
    /// zero-pads the tail), undoing a positive correlation lag of the same
    /// size. Start time and metadata are untouched.
    pub fn shift_samples(&mut self, shift: isize) {
        let n = self.samples.len();
        if shift == 0 || n == 0 {
            return;
        }
        let mut shifted = vec![0.0; n];
        if shift > 0 {
            let s = (shift as usize).min(n);
            shifted[..n - s].copy_from_slice(&self.samples[s..]);
        } else {
            let s = ((-shift) as usize).min(n);
            shifted[s..].copy_from_slice(&self.samples[..n - s]);
        }
        self.samples = shifted;
    }
}

/// True when a sample buffer is empty or has no variation, which makes
/// correlation and spectral normalization undefined.
pub fn is_degenerate(samples: &[f64]) -> bool {
    let Some(&first) = samples.first() else {
        return true;
    };
    samples
        .iter()
        .all(|&s| (s - first).abs() <= f64::EPSILON * first.abs().max(1.0))
}

/// Station-scoped analysis failures.
///
/// Every variant is non-fatal to the pair and the run: the station is
/// logged and skipped, and the pair continues with its remaining stations.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Station coordinates not resolvable within tolerance.
    #[error("no coordinates for {station} within tolerance")]
    LookupFailure { station: StationKey },

    /// No usable pick for the phase.
    #[error("no usable {phase} pick")]
    MissingPhase { phase: PhaseKind },

    /// No waveform available for the station.
    #[error("no waveform for {station}")]
    MissingWaveform { station: StationKey },

    /// A derived pick could not be computed.
    #[error("pick estimation failed: {0}")]
    PickEstimation(String),

    /// A trace is empty or has zero variance.
    #[error("empty or constant trace")]
    EmptyOrConstantTrace,

    /// Too few coherent bins in the target band for a stable slope fit.
    #[error("only {coherent} of {in_band} bins in {low_hz:.2}-{high_hz:.2} Hz are coherent")]
    LowCoherence {
        coherent: usize,
        in_band: usize,
        low_hz: f64,
        high_hz: f64,
    },

    /// The two traces do not share a sample rate.
    #[error("sample rate mismatch: {0} Hz vs {1} Hz")]
    SampleRateMismatch(f64, f64),
}

/// Type alias for analysis results.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Per-station similarity record for an accepted (pair, station).
///
/// Exists only for stations that passed both the correlation and delta-sp
/// acceptance tests; never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationSimilarity {
    /// Station the record belongs to.
    pub station: StationKey,
    /// Refined full-window normalized cross-correlation value.
    pub cc_value: f64,
    /// S-minus-P subsample delay residual in seconds.
    pub delta_sp: f64,
    /// Final P subsample delay in seconds.
    pub delay_p: f64,
    /// Final S subsample delay in seconds.
    pub delay_s: f64,
}

/// All accepted station records for one event pair, with the acceptance
/// criteria its threshold rule selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairSummary {
    /// Canonical pair key.
    pub pair: PairId,
    /// The larger of the two event magnitudes, which selected the rule.
    pub magnitude: f64,
    /// Minimum accepted stations for this pair to count as similar.
    pub min_stations: usize,
    /// Accepted station records.
    pub stations: Vec<StationSimilarity>,
}

impl PairSummary {
    /// Whether the pair has enough accepted stations to form an edge.
    pub fn qualifies(&self) -> bool {
        self.stations.len() >= self.min_stations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trace(samples: Vec<f64>, rate: f64) -> Trace {
        Trace {
            network: "UW".to_string(),
            station: "TEST".to_string(),
            sample_rate: rate,
            start_time: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            samples,
        }
    }

    #[test]
    fn trim_around_extracts_interior_window() {
        let mut t = trace((0..100).map(|i| i as f64).collect(), 10.0);
        // [5.0 - 1.0, 5.0 + 2.0) at 10 Hz -> samples 40..70
        t.trim_around(5.0, 1.0, 2.0);
        assert_eq!(t.len(), 30);
        assert_eq!(t.samples[0], 40.0);
        assert_eq!(t.samples[29], 69.0);
    }

    #[test]
    fn trim_around_zero_fills_out_of_bounds() {
        let mut t = trace((0..10).map(|i| i as f64 + 1.0).collect(), 1.0);
        // Window [-3, 2) extends 3 samples before the trace start.
        t.trim_around(0.0, 3.0, 2.0);
        assert_eq!(t.len(), 5);
        assert_eq!(&t.samples[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&t.samples[3..], &[1.0, 2.0]);
    }

    #[test]
    fn trim_around_updates_start_time() {
        let mut t = trace(vec![0.0; 100], 10.0);
        let original = t.start_time;
        t.trim_around(5.0, 1.0, 2.0);
        let shifted = seconds_between(t.start_time, original);
        assert!((shifted - 4.0).abs() < 1e-9, "expected 4s shift, got {shifted}");
    }

    #[test]
    fn shift_samples_positive_advances_content() {
        let mut t = trace(vec![1.0, 2.0, 3.0, 4.0, 5.0], 1.0);
        t.shift_samples(2);
        assert_eq!(t.samples, vec![3.0, 4.0, 5.0, 0.0, 0.0]);
    }

    #[test]
    fn shift_samples_negative_delays_content() {
        let mut t = trace(vec![1.0, 2.0, 3.0, 4.0, 5.0], 1.0);
        t.shift_samples(-2);
        assert_eq!(t.samples, vec![0.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn degenerate_detects_constant_and_empty() {
        assert!(is_degenerate(&[]));
        assert!(is_degenerate(&[3.7; 64]));
        assert!(is_degenerate(&[0.0; 8]));
        assert!(!is_degenerate(&[0.0, 1.0, 0.0]));
    }

    #[test]
    fn pair_summary_qualifies_on_station_count() {
        let rec = StationSimilarity {
            station: StationKey::new("UW", "A"),
            cc_value: 0.95,
            delta_sp: 0.01,
            delay_p: 0.0,
            delay_s: 0.01,
        };
        let summary = PairSummary {
            pair: PairId::new("a", "b"),
            magnitude: 1.5,
            min_stations: 2,
            stations: vec![rec.clone()],
        };
        assert!(!summary.qualifies());

        let mut enough = summary.clone();
        enough.stations.push(rec);
        assert!(enough.qualifies());
    }
}
