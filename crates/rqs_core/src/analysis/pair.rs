//! Per-pair, per-station similarity analysis.
//!
//! For each shared station the analyzer aligns the two traces, gates on
//! the full-window correlation, estimates P and S subsample delays from
//! the coherent cross-spectral phase, and gates on delta-sp. Station-level
//! failures are caught here, logged with their (network, station, pair)
//! context, and skipped; the pair continues with its remaining stations.

use crate::config::AnalysisSettings;
use crate::models::{Event, PairId, PhaseKind, StationKey};
use crate::providers::{PickProvider, WaveformSource};

use super::correlate::cross_correlate;
use super::filtering::bandpass_trace;
use super::multitaper::{cross_spectrum, MultitaperParams};
use super::phase_delay::fit_phase_slope;
use super::thresholds::ThresholdRule;
use super::types::{AnalysisError, AnalysisResult, PairSummary, StationSimilarity, Trace};

/// Analyzes one event pair at a time against shared stations.
pub struct PairAnalyzer<'a> {
    settings: &'a AnalysisSettings,
    picks: &'a dyn PickProvider,
    waveforms: &'a dyn WaveformSource,
}

impl<'a> PairAnalyzer<'a> {
    pub fn new(
        settings: &'a AnalysisSettings,
        picks: &'a dyn PickProvider,
        waveforms: &'a dyn WaveformSource,
    ) -> Self {
        Self {
            settings,
            picks,
            waveforms,
        }
    }

    /// Stations both events have waveforms for, in deterministic order.
    pub fn shared_stations(&self, a: &Event, b: &Event) -> Vec<StationKey> {
        let of_b = self.waveforms.stations_for(b);
        self.waveforms
            .stations_for(a)
            .into_iter()
            .filter(|station| of_b.contains(station))
            .collect()
    }

    /// Analyze every shared station of a pair under its threshold rule.
    pub fn analyze_pair(&self, a: &Event, b: &Event, rule: &ThresholdRule) -> PairSummary {
        let pair = PairId::new(&a.id, &b.id);
        let mut stations = Vec::new();

        for station in self.shared_stations(a, b) {
            match self.analyze_station(a, b, &station, rule) {
                Ok(Some(record)) => {
                    tracing::debug!(
                        pair = %pair,
                        station = %station,
                        cc = record.cc_value,
                        delta_sp = record.delta_sp,
                        "station accepted"
                    );
                    stations.push(record);
                }
                Ok(None) => {
                    // Quality rejection; the reason was logged at the site.
                }
                Err(err) => {
                    tracing::warn!(pair = %pair, station = %station, "station skipped: {err}");
                }
            }
        }

        PairSummary {
            pair,
            magnitude: a.magnitude.max(b.magnitude),
            min_stations: rule.min_stations,
            stations,
        }
    }

    /// Run the full alignment and delay pipeline for one station.
    ///
    /// `Ok(None)` is a quality rejection (correlation or delta-sp below
    /// par); `Err` is a station-level failure to be logged and skipped.
    pub fn analyze_station(
        &self,
        a: &Event,
        b: &Event,
        station: &StationKey,
        rule: &ThresholdRule,
    ) -> AnalysisResult<Option<StationSimilarity>> {
        let s = self.settings;
        let trace_a = self
            .waveforms
            .trace(a, station)
            .ok_or_else(|| AnalysisError::MissingWaveform {
                station: station.clone(),
            })?;
        let trace_b = self
            .waveforms
            .trace(b, station)
            .ok_or_else(|| AnalysisError::MissingWaveform {
                station: station.clone(),
            })?;

        // 1. Coarse alignment over the raw full traces.
        let coarse = cross_correlate(&trace_a, &trace_b, s.max_shift_samples)?;

        // 2. Mean pick delays per phase, in the coarse-aligned frame.
        let mean_p = self.mean_pick_delay(a, b, station, PhaseKind::P, &trace_a, &trace_b, coarse.shift)?;
        let mean_s = self.mean_pick_delay(a, b, station, PhaseKind::S, &trace_a, &trace_b, coarse.shift)?;

        // 3. Band-passed full-window refinement.
        let (low_hz, high_hz) = rule.band();
        let mut full_a = trace_a.clone();
        let mut full_b = trace_b.clone();
        bandpass_trace(&mut full_a, low_hz, high_hz, s.bandpass_order);
        bandpass_trace(&mut full_b, low_hz, high_hz, s.bandpass_order);
        full_b.shift_samples(coarse.shift);
        full_a.trim_around(mean_p, s.full_window_pre_secs, s.full_window_post_secs);
        full_b.trim_around(mean_p, s.full_window_pre_secs, s.full_window_post_secs);
        let refined = cross_correlate(&full_a, &full_b, s.max_shift_samples)?;
        let full_shift = coarse.shift + refined.shift;

        // 4. Correlation gate, checked on the refined full-window value.
        if refined.value < s.cc_min {
            tracing::debug!(
                station = %station,
                cc = refined.value,
                threshold = s.cc_min,
                "station rejected below correlation threshold"
            );
            return Ok(None);
        }

        // 5. Per-phase fine alignment and coherence delay, on fresh
        //    unfiltered copies.
        let delay_p = self.phase_delay(
            &trace_a,
            &trace_b,
            mean_p,
            (s.p_window_pre_secs, s.p_window_post_secs),
            full_shift,
            rule,
        )?;
        let delay_s = self.phase_delay(
            &trace_a,
            &trace_b,
            mean_s,
            (s.s_window_pre_secs, s.s_window_post_secs),
            full_shift,
            rule,
        )?;

        // 6. Delta-sp gate.
        let delta_sp = delay_s - delay_p;
        if delta_sp.abs() < rule.delta_sp_max {
            Ok(Some(StationSimilarity {
                station: station.clone(),
                cc_value: refined.value,
                delta_sp,
                delay_p,
                delay_s,
            }))
        } else {
            tracing::debug!(
                station = %station,
                delta_sp,
                threshold = rule.delta_sp_max,
                "station rejected above delta-sp threshold"
            );
            Ok(None)
        }
    }

    /// Average pick offset of the two events for one phase, with the
    /// second event's offset corrected into the coarse-aligned frame.
    #[allow(clippy::too_many_arguments)]
    fn mean_pick_delay(
        &self,
        a: &Event,
        b: &Event,
        station: &StationKey,
        phase: PhaseKind,
        trace_a: &Trace,
        trace_b: &Trace,
        coarse_shift: isize,
    ) -> AnalysisResult<f64> {
        let pick_a = self
            .picks
            .pick(a, station, phase)?
            .ok_or(AnalysisError::MissingPhase { phase })?;
        let pick_b = self
            .picks
            .pick(b, station, phase)?
            .ok_or(AnalysisError::MissingPhase { phase })?;

        let dt = trace_a.dt();
        let offset_a = trace_a.offset_of(pick_a.time);
        let offset_b = trace_b.offset_of(pick_b.time) - coarse_shift as f64 * dt;
        Ok(0.5 * (offset_a + offset_b))
    }

    /// Fine-align one phase window and estimate its subsample delay.
    ///
    /// The coherence stage contributes `slope/(2*pi)`; undoing the integer
    /// shifts applied along the way gives the delay relative to the
    /// original unshifted traces.
    fn phase_delay(
        &self,
        trace_a: &Trace,
        trace_b: &Trace,
        anchor_secs: f64,
        window: (f64, f64),
        prior_shift: isize,
        rule: &ThresholdRule,
    ) -> AnalysisResult<f64> {
        let s = self.settings;
        let dt = trace_a.dt();

        let mut win_a = trace_a.clone();
        let mut win_b = trace_b.clone();
        win_b.shift_samples(prior_shift);
        win_a.trim_around(anchor_secs, window.0, window.1);
        win_b.trim_around(anchor_secs, window.0, window.1);

        let fine = cross_correlate(&win_a, &win_b, s.max_shift_samples)?;
        win_b.shift_samples(fine.shift);

        let params = MultitaperParams {
            time_bandwidth: s.time_bandwidth,
            num_tapers: s.num_tapers,
        };
        let spectrum = cross_spectrum(&win_a.samples, &win_b.samples, dt, &params)?;
        let fit = fit_phase_slope(&spectrum, rule.band())?;

        let total_shift = prior_shift + fine.shift;
        Ok(fit.delay_seconds() - dt * total_shift as f64)
    }
}
