//! Multitaper cross-spectral estimation.
//!
//! DPSS (Slepian) tapers are computed from the symmetric tridiagonal
//! formulation: Sturm-sequence bisection locates the top-K eigenvalues,
//! inverse iteration with partial pivoting recovers the eigenvectors.
//! The cross-spectrum averages per-taper eigenspectra, which keeps the
//! per-bin coherence estimate stable enough to gate the phase-slope fit.

use std::f64::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

use super::types::{is_degenerate, AnalysisError, AnalysisResult};

/// Multitaper estimation parameters.
#[derive(Debug, Clone, Copy)]
pub struct MultitaperParams {
    /// Time-bandwidth product NW.
    pub time_bandwidth: f64,
    /// Number of tapers, conventionally 2*NW - 1.
    pub num_tapers: usize,
}

/// One-sided multitaper cross-spectrum of two equal-length series.
#[derive(Debug, Clone)]
pub struct CrossSpectrum {
    /// Bin center frequencies in Hz.
    pub freqs: Vec<f64>,
    /// Averaged cross-spectrum conj(X)*Y per bin.
    pub cross: Vec<Complex<f64>>,
    /// Magnitude-squared coherence per bin, in [0, 1].
    pub coherence: Vec<f64>,
}

/// Compute the multitaper cross-spectrum of `x` and `y` sampled at `dt`.
///
/// The one-sided bin count is `npts / 2 + 1`, a formula preserved verbatim
/// from the source system (see the pinning test below); it is not
/// re-derived here.
pub fn cross_spectrum(
    x: &[f64],
    y: &[f64],
    dt: f64,
    params: &MultitaperParams,
) -> AnalysisResult<CrossSpectrum> {
    if is_degenerate(x) || is_degenerate(y) {
        return Err(AnalysisError::EmptyOrConstantTrace);
    }

    let npts = x.len().min(y.len());
    let nbins = npts / 2 + 1;
    let tapers = dpss_tapers(npts, params.time_bandwidth, params.num_tapers);
    if tapers.is_empty() {
        return Err(AnalysisError::EmptyOrConstantTrace);
    }

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(npts);

    let mut sxx = vec![0.0; nbins];
    let mut syy = vec![0.0; nbins];
    let mut sxy = vec![Complex::new(0.0, 0.0); nbins];

    let mut buf_x: Vec<Complex<f64>> = Vec::with_capacity(npts);
    let mut buf_y: Vec<Complex<f64>> = Vec::with_capacity(npts);
    for taper in &tapers {
        buf_x.clear();
        buf_y.clear();
        for i in 0..npts {
            buf_x.push(Complex::new(x[i] * taper[i], 0.0));
            buf_y.push(Complex::new(y[i] * taper[i], 0.0));
        }
        fft.process(&mut buf_x);
        fft.process(&mut buf_y);

        for i in 0..nbins {
            sxy[i] += buf_x[i].conj() * buf_y[i];
            sxx[i] += buf_x[i].norm_sqr();
            syy[i] += buf_y[i].norm_sqr();
        }
    }

    let df = 1.0 / (npts as f64 * dt);
    let freqs = (0..nbins).map(|i| i as f64 * df).collect();
    let coherence = (0..nbins)
        .map(|i| {
            let denom = sxx[i] * syy[i];
            if denom > 0.0 {
                (sxy[i].norm_sqr() / denom).min(1.0)
            } else {
                0.0
            }
        })
        .collect();

    Ok(CrossSpectrum {
        freqs,
        cross: sxy,
        coherence,
    })
}

/// Compute the first `k` DPSS tapers of length `n` with time-bandwidth
/// product `nw`, each normalized to unit energy.
///
/// The tapers are the dominant eigenvectors of the symmetric tridiagonal
/// matrix with diagonal `((n-1)/2 - i)^2 cos(2*pi*W)` and off-diagonal
/// `i(n-i)/2`, W = nw/n.
pub fn dpss_tapers(n: usize, nw: f64, k: usize) -> Vec<Vec<f64>> {
    if n < 2 || k == 0 {
        return Vec::new();
    }
    let k = k.min(n);
    let w = nw / n as f64;
    let cos_w = (2.0 * PI * w).cos();

    let diag: Vec<f64> = (0..n)
        .map(|i| {
            let c = (n - 1) as f64 / 2.0 - i as f64;
            c * c * cos_w
        })
        .collect();
    // off[i] couples rows i-1 and i; off[0] is unused.
    let mut off = vec![0.0; n];
    for i in 1..n {
        off[i] = (i * (n - i)) as f64 / 2.0;
    }

    let mut tapers: Vec<Vec<f64>> = Vec::with_capacity(k);
    for order in 0..k {
        let eigen_index = n - 1 - order;
        let lambda = eigenvalue_by_index(&diag, &off, eigen_index);

        let mut v = seed_vector(n, order as u64);
        normalize(&mut v);
        for _ in 0..4 {
            orthogonalize(&mut v, &tapers);
            v = solve_shifted(&diag, &off, lambda, &v);
            orthogonalize(&mut v, &tapers);
            normalize(&mut v);
        }
        fix_sign(&mut v);
        tapers.push(v);
    }
    tapers
}

/// Number of eigenvalues of the tridiagonal matrix strictly below `x`,
/// via the Sturm sequence of leading principal minors.
fn sturm_count(diag: &[f64], off: &[f64], x: f64) -> usize {
    let mut count = 0;
    let mut q = diag[0] - x;
    if q < 0.0 {
        count += 1;
    }
    for i in 1..diag.len() {
        let denom = if q.abs() < f64::MIN_POSITIVE {
            f64::MIN_POSITIVE
        } else {
            q
        };
        q = diag[i] - x - off[i] * off[i] / denom;
        if q < 0.0 {
            count += 1;
        }
    }
    count
}

/// The `m`-th eigenvalue in ascending order, by bisection over the
/// Gershgorin interval.
fn eigenvalue_by_index(diag: &[f64], off: &[f64], m: usize) -> f64 {
    let n = diag.len();
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for i in 0..n {
        let radius = off[i].abs() + if i + 1 < n { off[i + 1].abs() } else { 0.0 };
        lo = lo.min(diag[i] - radius);
        hi = hi.max(diag[i] + radius);
    }

    for _ in 0..90 {
        let mid = 0.5 * (lo + hi);
        if sturm_count(diag, off, mid) >= m + 1 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Solve `(T - shift*I) x = rhs` by tridiagonal Gaussian elimination with
/// partial pivoting; the swap introduces a second superdiagonal.
fn solve_shifted(diag: &[f64], off: &[f64], shift: f64, rhs: &[f64]) -> Vec<f64> {
    let n = diag.len();
    let mut d: Vec<f64> = diag.iter().map(|&v| v - shift).collect();
    let mut c = vec![0.0; n];
    let mut e = vec![0.0; n];
    for i in 0..n - 1 {
        c[i] = off[i + 1];
    }
    let mut b = rhs.to_vec();

    for i in 0..n - 1 {
        // Row i+1's coefficient on x_i is still the pristine off-diagonal:
        // earlier steps only touched rows up through i.
        let mut a = off[i + 1];
        if a.abs() > d[i].abs() {
            std::mem::swap(&mut d[i], &mut a);
            let t = c[i];
            c[i] = d[i + 1];
            d[i + 1] = t;
            let t = e[i];
            e[i] = c[i + 1];
            c[i + 1] = t;
            b.swap(i, i + 1);
        }
        let pivot = if d[i].abs() < f64::MIN_POSITIVE {
            f64::MIN_POSITIVE
        } else {
            d[i]
        };
        let factor = a / pivot;
        d[i + 1] -= factor * c[i];
        c[i + 1] -= factor * e[i];
        b[i + 1] -= factor * b[i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut acc = b[i];
        if i + 1 < n {
            acc -= c[i] * x[i + 1];
        }
        if i + 2 < n {
            acc -= e[i] * x[i + 2];
        }
        let pivot = if d[i].abs() < f64::MIN_POSITIVE {
            f64::MIN_POSITIVE
        } else {
            d[i]
        };
        x[i] = acc / pivot;
    }
    x
}

/// Deterministic full-spectrum start vector for inverse iteration. A plain
/// constant vector would be orthogonal to every antisymmetric taper.
fn seed_vector(n: usize, order: u64) -> Vec<f64> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64.wrapping_add(order.wrapping_mul(0xBF58_476D_1CE4_E5B9));
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        })
        .collect()
}

fn normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn orthogonalize(v: &mut [f64], basis: &[Vec<f64>]) {
    for u in basis {
        let dot: f64 = v.iter().zip(u).map(|(a, b)| a * b).sum();
        for (x, &y) in v.iter_mut().zip(u) {
            *x -= dot * y;
        }
    }
}

/// Sign convention: symmetric tapers integrate positive; antisymmetric
/// ones start with a positive lobe.
fn fix_sign(v: &mut [f64]) {
    let sum: f64 = v.iter().sum();
    let flip = if sum.abs() > 1e-9 {
        sum < 0.0
    } else {
        let lead = v.iter().find(|x| x.abs() > 1e-9).copied().unwrap_or(0.0);
        lead < 0.0
    };
    if flip {
        for x in v.iter_mut() {
            *x = -*x;
        }
    }
}
