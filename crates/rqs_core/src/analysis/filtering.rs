//! Band-pass filtering applied before the refined correlation pass.
//!
//! IIR Butterworth design via the biquad crate. Band-pass is realized as a
//! high-pass/low-pass cascade of second-order sections. Both traces of a
//! pair are filtered identically, so the causal group delay cancels in the
//! relative lag.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F64};

use super::types::Trace;

/// Butterworth band-pass over `[low_hz, high_hz]`.
pub fn bandpass(samples: &[f64], sample_rate: f64, low_hz: f64, high_hz: f64, order: usize) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }

    // High-pass removes energy below the low corner, low-pass removes
    // energy above the high corner; each side gets half the order.
    let half_order = (order + 1) / 2;
    let high_passed = run_sections(samples, Type::HighPass, sample_rate, low_hz, half_order);
    run_sections(&high_passed, Type::LowPass, sample_rate, high_hz, half_order)
}

/// Band-pass a trace in place. Callers hand in a private copy.
pub fn bandpass_trace(trace: &mut Trace, low_hz: f64, high_hz: f64, order: usize) {
    trace.samples = bandpass(&trace.samples, trace.sample_rate, low_hz, high_hz, order);
}

/// Run cascaded second-order sections of one Butterworth prototype.
fn run_sections(
    samples: &[f64],
    filter_type: Type<f64>,
    sample_rate: f64,
    corner_hz: f64,
    order: usize,
) -> Vec<f64> {
    let coeffs = match Coefficients::<f64>::from_params(
        filter_type,
        sample_rate.hz(),
        corner_hz.hz(),
        Q_BUTTERWORTH_F64,
    ) {
        Ok(c) => c,
        // Corner at or beyond Nyquist: leave the signal untouched rather
        // than abort the station.
        Err(_) => return samples.to_vec(),
    };

    let num_sections = ((order + 1) / 2).max(1);
    let mut filtered = samples.to_vec();
    for _ in 0..num_sections {
        let mut section = DirectForm2Transposed::<f64>::new(coeffs);
        for sample in &mut filtered {
            *sample = section.run(*sample);
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq_hz: f64, sample_rate: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / sample_rate).sin())
            .collect()
    }

    fn tail_energy(samples: &[f64]) -> f64 {
        let start = samples.len() / 2;
        samples[start..].iter().map(|x| x * x).sum()
    }

    #[test]
    fn bandpass_preserves_length() {
        let samples = tone(5.0, 100.0, 500);
        let filtered = bandpass(&samples, 100.0, 1.0, 10.0, 4);
        assert_eq!(filtered.len(), samples.len());
    }

    #[test]
    fn bandpass_passes_in_band_tone() {
        let samples = tone(5.0, 100.0, 2000);
        let filtered = bandpass(&samples, 100.0, 1.0, 10.0, 2);
        let original = tail_energy(&samples);
        let kept = tail_energy(&filtered);
        assert!(
            kept > original * 0.3,
            "in-band tone should survive: original={original}, filtered={kept}"
        );
    }

    #[test]
    fn bandpass_attenuates_low_frequency() {
        let samples = tone(0.1, 100.0, 2000);
        let filtered = bandpass(&samples, 100.0, 1.0, 10.0, 4);
        let original = tail_energy(&samples);
        let kept = tail_energy(&filtered);
        assert!(
            kept < original * 0.2,
            "sub-band tone should be attenuated: original={original}, filtered={kept}"
        );
    }

    #[test]
    fn bandpass_attenuates_high_frequency() {
        let samples = tone(40.0, 100.0, 2000);
        let filtered = bandpass(&samples, 100.0, 1.0, 10.0, 4);
        let original = tail_energy(&samples);
        let kept = tail_energy(&filtered);
        assert!(
            kept < original * 0.2,
            "super-band tone should be attenuated: original={original}, filtered={kept}"
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(bandpass(&[], 100.0, 1.0, 10.0, 4).is_empty());
    }
}
