//! Subsample delay estimation from the cross-spectral phase slope.
//!
//! Inside the target band, bins whose coherence clears the acceptance
//! floor contribute their unwrapped cross-spectral phase to a linear
//! least-squares fit against frequency. The fitted slope is a time delay
//! finer than one sample interval: the stage contributes
//! `slope / (2*pi)` seconds, and callers fold in the integer shifts that
//! were already applied.

use std::f64::consts::PI;

use super::multitaper::CrossSpectrum;
use super::types::{AnalysisError, AnalysisResult};

/// Minimum magnitude-squared coherence for a bin to enter the fit.
const COHERENCE_FLOOR: f64 = 0.5;

/// Result of the phase-vs-frequency regression.
#[derive(Debug, Clone)]
pub struct PhaseSlopeFit {
    /// Regression slope of unwrapped phase against frequency, radians/Hz.
    pub slope: f64,
    /// Spectrum bin indices that entered the fit.
    pub used_bins: Vec<usize>,
}

impl PhaseSlopeFit {
    /// Subsample delay contributed by this stage, in seconds.
    pub fn delay_seconds(&self) -> f64 {
        self.slope / (2.0 * PI)
    }
}

/// Fit the unwrapped cross-spectral phase slope over the coherent portion
/// of `band`.
///
/// A stable fit needs a majority of the in-band bins (and never fewer than
/// two) above the coherence floor; anything less is `LowCoherence`.
pub fn fit_phase_slope(
    spectrum: &CrossSpectrum,
    band: (f64, f64),
) -> AnalysisResult<PhaseSlopeFit> {
    let (low_hz, high_hz) = band;

    let in_band: Vec<usize> = spectrum
        .freqs
        .iter()
        .enumerate()
        .filter(|(_, &f)| f >= low_hz && f <= high_hz)
        .map(|(i, _)| i)
        .collect();

    let used: Vec<usize> = in_band
        .iter()
        .copied()
        .filter(|&i| spectrum.coherence[i] >= COHERENCE_FLOOR)
        .collect();

    let required = ((in_band.len() + 1) / 2).max(2);
    if used.len() < required {
        return Err(AnalysisError::LowCoherence {
            coherent: used.len(),
            in_band: in_band.len(),
            low_hz,
            high_hz,
        });
    }

    // Unwrap the phase across the selected bins in frequency order.
    let mut phases = Vec::with_capacity(used.len());
    let mut previous = 0.0;
    for (k, &i) in used.iter().enumerate() {
        let mut phi = spectrum.cross[i].arg();
        if k > 0 {
            while phi - previous > PI {
                phi -= 2.0 * PI;
            }
            while phi - previous < -PI {
                phi += 2.0 * PI;
            }
        }
        phases.push(phi);
        previous = phi;
    }

    let n = used.len() as f64;
    let mean_f = used.iter().map(|&i| spectrum.freqs[i]).sum::<f64>() / n;
    let mean_p = phases.iter().sum::<f64>() / n;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (k, &i) in used.iter().enumerate() {
        let df = spectrum.freqs[i] - mean_f;
        numerator += df * (phases[k] - mean_p);
        denominator += df * df;
    }
    if !(denominator > 0.0) {
        return Err(AnalysisError::LowCoherence {
            coherent: used.len(),
            in_band: in_band.len(),
            low_hz,
            high_hz,
        });
    }

    Ok(PhaseSlopeFit {
        slope: numerator / denominator,
        used_bins: used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::num_complex::Complex;
    use rustfft::FftPlanner;

    use crate::analysis::multitaper::{cross_spectrum, MultitaperParams};

    /// Synthetic one-sided spectrum with a pure linear phase ramp
    /// `phi(f) = 2*pi*f*delay` and uniform coherence.
    fn ramp_spectrum(delay_secs: f64, coherence: f64) -> CrossSpectrum {
        let freqs: Vec<f64> = (0..101).map(|i| i as f64 * 0.5).collect();
        let cross = freqs
            .iter()
            .map(|&f| Complex::from_polar(1.0, 2.0 * PI * f * delay_secs))
            .collect();
        let coherence = vec![coherence; freqs.len()];
        CrossSpectrum {
            freqs,
            cross,
            coherence,
        }
    }

    fn noise(len: usize, mut state: u64) -> Vec<f64> {
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
            })
            .collect()
    }

    /// Circularly advance a series by a fractional sample count using a
    /// DFT phase ramp, so `out[m] ~ x[m + shift]`.
    fn subsample_advanced(x: &[f64], shift_samples: f64) -> Vec<f64> {
        let n = x.len();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        let ifft = planner.plan_fft_inverse(n);

        let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
        fft.process(&mut buf);
        for (k, value) in buf.iter_mut().enumerate() {
            let fk = if k <= n / 2 {
                k as f64
            } else {
                k as f64 - n as f64
            };
            *value *= Complex::from_polar(1.0, 2.0 * PI * fk * shift_samples / n as f64);
        }
        ifft.process(&mut buf);
        buf.iter().map(|c| c.re / n as f64).collect()
    }

    #[test]
    fn recovers_delay_from_pure_phase_ramp() {
        let delay = 0.004;
        let spec = ramp_spectrum(delay, 1.0);
        let fit = fit_phase_slope(&spec, (1.0, 10.0)).unwrap();
        assert!(
            (fit.delay_seconds() - delay).abs() < 1e-12,
            "expected {delay}, got {}",
            fit.delay_seconds()
        );
    }

    #[test]
    fn unwraps_phase_that_crosses_pi() {
        // 0.1 s over 1-10 Hz sweeps ~5.7 rad of phase, forcing a wrap.
        let delay = 0.1;
        let spec = ramp_spectrum(delay, 1.0);
        let fit = fit_phase_slope(&spec, (1.0, 10.0)).unwrap();
        assert!(
            (fit.delay_seconds() - delay).abs() < 1e-9,
            "expected {delay}, got {}",
            fit.delay_seconds()
        );
    }

    #[test]
    fn uniform_low_coherence_fails() {
        let spec = ramp_spectrum(0.004, 0.2);
        let err = fit_phase_slope(&spec, (1.0, 10.0)).unwrap_err();
        assert!(matches!(err, AnalysisError::LowCoherence { coherent: 0, .. }));
    }

    #[test]
    fn reports_in_band_bin_counts() {
        let spec = ramp_spectrum(0.004, 0.2);
        match fit_phase_slope(&spec, (1.0, 10.0)) {
            Err(AnalysisError::LowCoherence { in_band, .. }) => {
                // 1.0..=10.0 Hz at 0.5 Hz spacing.
                assert_eq!(in_band, 19);
            }
            other => panic!("expected LowCoherence, got {other:?}"),
        }
    }

    #[test]
    fn recovers_subsample_delay_through_the_multitaper_path() {
        let dt = 0.01;
        let x = noise(400, 42);
        // Advance by 0.3 samples = 3 ms.
        let y = subsample_advanced(&x, 0.3);

        let params = MultitaperParams {
            time_bandwidth: 4.0,
            num_tapers: 7,
        };
        let spec = cross_spectrum(&x, &y, dt, &params).unwrap();
        let fit = fit_phase_slope(&spec, (2.0, 20.0)).unwrap();

        let expected = 0.3 * dt;
        assert!(
            (fit.delay_seconds() - expected).abs() < 0.05 * dt,
            "expected ~{expected}, got {}",
            fit.delay_seconds()
        );
        assert!(fit.used_bins.len() >= 2);
    }

    #[test]
    fn independent_noise_has_low_coherence() {
        let x = noise(512, 1);
        let y = noise(512, 0xDEAD_BEEF);
        let params = MultitaperParams {
            time_bandwidth: 4.0,
            num_tapers: 7,
        };
        let spec = cross_spectrum(&x, &y, 0.01, &params).unwrap();
        assert!(matches!(
            fit_phase_slope(&spec, (5.0, 20.0)),
            Err(AnalysisError::LowCoherence { .. })
        ));
    }
}
