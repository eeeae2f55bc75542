//! Bounded-lag normalized cross-correlation.
//!
//! Finds the integer-sample lag that best aligns two equal-rate traces,
//! searching only `[-max_shift, max_shift]`. Used twice per pair/station:
//! once on full windows for coarse alignment, once on phase windows for
//! fine alignment; the two shifts compose additively.

use super::types::{is_degenerate, AnalysisError, AnalysisResult, Trace};

/// Integer lag and normalized correlation value of the best alignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alignment {
    /// Lag in samples. Positive means the second trace is delayed relative
    /// to the first; applying `shift_samples(shift)` to it undoes the lag.
    pub shift: isize,
    /// Normalized correlation at the peak, in [-1, 1].
    pub value: f64,
}

/// Cross-correlate two equal-rate traces within a bounded lag range.
///
/// Ties break toward the first maximum in increasing-lag order.
pub fn cross_correlate(
    reference: &Trace,
    other: &Trace,
    max_shift: usize,
) -> AnalysisResult<Alignment> {
    if (reference.sample_rate - other.sample_rate).abs() > f64::EPSILON {
        return Err(AnalysisError::SampleRateMismatch(
            reference.sample_rate,
            other.sample_rate,
        ));
    }
    correlate_samples(&reference.samples, &other.samples, max_shift)
}

/// Sample-buffer form of [`cross_correlate`].
pub fn correlate_samples(a: &[f64], b: &[f64], max_shift: usize) -> AnalysisResult<Alignment> {
    if is_degenerate(a) || is_degenerate(b) {
        return Err(AnalysisError::EmptyOrConstantTrace);
    }

    let max = max_shift as isize;
    let mut best: Option<Alignment> = None;
    for lag in -max..=max {
        let Some(value) = pearson_at_lag(a, b, lag) else {
            continue;
        };
        if best.map_or(true, |current| value > current.value) {
            best = Some(Alignment { shift: lag, value });
        }
    }

    // Every admissible lag had a flat or empty overlap; the search range
    // exceeds what the signals can support.
    best.ok_or(AnalysisError::EmptyOrConstantTrace)
}

/// Pearson correlation of the overlapping region at one lag, demeaned over
/// the overlap itself so an exact shifted copy scores exactly 1.0.
fn pearson_at_lag(a: &[f64], b: &[f64], lag: isize) -> Option<f64> {
    let start = (-lag).max(0) as usize;
    let end = a.len().min((b.len() as isize - lag).max(0) as usize);
    if end <= start + 1 {
        return None;
    }
    let n = (end - start) as f64;

    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    for i in start..end {
        sum_a += a[i];
        sum_b += b[(i as isize + lag) as usize];
    }
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in start..end {
        let x = a[i] - mean_a;
        let y = b[(i as isize + lag) as usize] - mean_b;
        cov += x * y;
        var_a += x * x;
        var_b += y * y;
    }

    let denom = (var_a * var_b).sqrt();
    if !(denom > 0.0) {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}
