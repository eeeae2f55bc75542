//! Pairwise similarity analysis engine.
//!
//! The pipeline that decides whether two events repeat each other at one
//! station, composed from leaf components:
//!
//! 1. **Thresholds** (`thresholds`): magnitude-dependent band, delta-sp
//!    limit, and station count.
//!
//! 2. **Correlation** (`correlate`): bounded-lag normalized
//!    cross-correlation for coarse and fine integer alignment.
//!
//! 3. **Filtering** (`filtering`): Butterworth band-pass ahead of the
//!    refined full-window correlation.
//!
//! 4. **Multitaper spectra** (`multitaper`): DPSS tapers, averaged
//!    cross-spectrum, per-bin coherence.
//!
//! 5. **Phase-slope delay** (`phase_delay`): subsample delay from the
//!    coherent in-band phase ramp.
//!
//! 6. **Pair orchestration** (`pair`): the per-station pipeline with
//!    skip-and-log failure handling.
//!
//! 7. **Scan** (`scanner`): rayon-parallel all-pairs sweep feeding family
//!    construction.

pub mod correlate;
pub mod filtering;
pub mod multitaper;
pub mod pair;
pub mod phase_delay;
pub mod scanner;
pub mod thresholds;
pub mod types;

// Re-export the main types for crate users.
pub use correlate::{correlate_samples, cross_correlate, Alignment};
pub use multitaper::{cross_spectrum, dpss_tapers, CrossSpectrum, MultitaperParams};
pub use pair::PairAnalyzer;
pub use phase_delay::{fit_phase_slope, PhaseSlopeFit};
pub use scanner::{ScanResult, Scanner};
pub use thresholds::{RuleError, ThresholdPolicy, ThresholdRule};
pub use types::{
    is_degenerate, AnalysisError, AnalysisResult, PairSummary, StationSimilarity, Trace,
};
