//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Loaded once at startup and passed by reference into the components that
//! need them, never held as ambient state.

use serde::{Deserialize, Serialize};

use crate::analysis::thresholds::ThresholdRule;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Pairwise analysis parameters.
    #[serde(default)]
    pub analysis: AnalysisSettings,

    /// Magnitude-keyed threshold rules, ordered by ascending boundary.
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<ThresholdRule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logging: LoggingSettings::default(),
            analysis: AnalysisSettings::default(),
            thresholds: default_thresholds(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default log level when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Numeric parameters of the pairwise similarity analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Maximum admissible correlation lag in samples.
    #[serde(default = "default_max_shift")]
    pub max_shift_samples: usize,

    /// Minimum full-window cross-correlation value for a station to count.
    #[serde(default = "default_cc_min")]
    pub cc_min: f64,

    /// Full cross-correlation window before the P anchor (seconds).
    #[serde(default = "default_full_pre")]
    pub full_window_pre_secs: f64,

    /// Full cross-correlation window after the P anchor (seconds).
    #[serde(default = "default_full_post")]
    pub full_window_post_secs: f64,

    /// P-phase window before the anchor (seconds).
    #[serde(default = "default_phase_pre")]
    pub p_window_pre_secs: f64,

    /// P-phase window after the anchor (seconds).
    #[serde(default = "default_phase_post")]
    pub p_window_post_secs: f64,

    /// S-phase window before the anchor (seconds).
    #[serde(default = "default_phase_pre")]
    pub s_window_pre_secs: f64,

    /// S-phase window after the anchor (seconds).
    #[serde(default = "default_phase_post")]
    pub s_window_post_secs: f64,

    /// Multitaper time-bandwidth product NW.
    #[serde(default = "default_time_bandwidth")]
    pub time_bandwidth: f64,

    /// Number of DPSS tapers, conventionally 2*NW - 1.
    #[serde(default = "default_num_tapers")]
    pub num_tapers: usize,

    /// Butterworth band-pass order used before the refined correlation.
    #[serde(default = "default_bandpass_order")]
    pub bandpass_order: usize,
}

fn default_max_shift() -> usize {
    100
}

fn default_cc_min() -> f64 {
    0.7
}

fn default_full_pre() -> f64 {
    2.0
}

fn default_full_post() -> f64 {
    20.0
}

fn default_phase_pre() -> f64 {
    0.5
}

fn default_phase_post() -> f64 {
    1.5
}

fn default_time_bandwidth() -> f64 {
    4.0
}

fn default_num_tapers() -> usize {
    7
}

fn default_bandpass_order() -> usize {
    4
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_shift_samples: default_max_shift(),
            cc_min: default_cc_min(),
            full_window_pre_secs: default_full_pre(),
            full_window_post_secs: default_full_post(),
            p_window_pre_secs: default_phase_pre(),
            p_window_post_secs: default_phase_post(),
            s_window_pre_secs: default_phase_pre(),
            s_window_post_secs: default_phase_post(),
            time_bandwidth: default_time_bandwidth(),
            num_tapers: default_num_tapers(),
            bandpass_order: default_bandpass_order(),
        }
    }
}

fn default_thresholds() -> Vec<ThresholdRule> {
    vec![
        ThresholdRule {
            max_magnitude: 2.0,
            band_low_hz: 2.0,
            band_high_hz: 10.0,
            delta_sp_max: 0.05,
            min_stations: 2,
        },
        ThresholdRule {
            max_magnitude: 3.5,
            band_low_hz: 1.0,
            band_high_hz: 8.0,
            delta_sp_max: 0.08,
            min_stations: 2,
        },
        ThresholdRule {
            max_magnitude: 9.0,
            band_low_hz: 0.5,
            band_high_hz: 5.0,
            delta_sp_max: 0.10,
            min_stations: 3,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_have_threshold_rules() {
        let settings = Settings::default();
        assert!(!settings.thresholds.is_empty());
        assert!(settings.analysis.num_tapers >= 1);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.analysis.max_shift_samples, default_max_shift());
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.thresholds.len(), default_thresholds().len());
    }

    #[test]
    fn partial_analysis_section_keeps_other_defaults() {
        let settings: Settings = toml::from_str("[analysis]\ncc_min = 0.5\n").unwrap();
        assert_eq!(settings.analysis.cc_min, 0.5);
        assert_eq!(settings.analysis.num_tapers, default_num_tapers());
    }
}
