//! Configuration loading, validation, and atomic saves.
//!
//! Malformed configuration is fatal at load time: the run never starts
//! with an ill-formed threshold rule list or nonsensical windows.

mod settings;

pub use settings::{AnalysisSettings, LoggingSettings, Settings};

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::analysis::thresholds::{RuleError, ThresholdPolicy};

/// Errors that can occur during config operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid threshold rules: {0}")]
    InvalidThresholds(#[from] RuleError),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Result type for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load settings from a TOML file, failing if it does not exist.
pub fn load(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    validate(&settings)?;
    Ok(settings)
}

/// Load settings from a TOML file, falling back to defaults when absent.
pub fn load_or_default(path: impl AsRef<Path>) -> ConfigResult<Settings> {
    let path = path.as_ref();
    if path.exists() {
        load(path)
    } else {
        let settings = Settings::default();
        validate(&settings)?;
        Ok(settings)
    }
}

/// Save settings atomically: write to a temp file, then rename over the
/// target so a crash never leaves a half-written config behind.
pub fn save(settings: &Settings, path: impl AsRef<Path>) -> ConfigResult<()> {
    let path = path.as_ref();
    let content = toml::to_string_pretty(settings)?;

    let tmp_path = path.with_extension("toml.tmp");
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Validate a settings value, checking everything that would otherwise
/// surface mid-run.
pub fn validate(settings: &Settings) -> ConfigResult<()> {
    // Building the policy performs the rule-list checks.
    ThresholdPolicy::from_rules(settings.thresholds.clone())?;

    let a = &settings.analysis;
    for (name, value) in [
        ("full_window_pre_secs", a.full_window_pre_secs),
        ("full_window_post_secs", a.full_window_post_secs),
        ("p_window_pre_secs", a.p_window_pre_secs),
        ("p_window_post_secs", a.p_window_post_secs),
        ("s_window_pre_secs", a.s_window_pre_secs),
        ("s_window_post_secs", a.s_window_post_secs),
    ] {
        if !(value > 0.0) {
            return Err(ConfigError::InvalidSetting(format!(
                "{name} must be positive, got {value}"
            )));
        }
    }
    if !(a.cc_min > -1.0 && a.cc_min <= 1.0) {
        return Err(ConfigError::InvalidSetting(format!(
            "cc_min must lie in (-1, 1], got {}",
            a.cc_min
        )));
    }
    if a.num_tapers == 0 {
        return Err(ConfigError::InvalidSetting(
            "num_tapers must be at least 1".to_string(),
        ));
    }
    if !(a.time_bandwidth > 0.0) {
        return Err(ConfigError::InvalidSetting(format!(
            "time_bandwidth must be positive, got {}",
            a.time_bandwidth
        )));
    }
    if a.num_tapers as f64 >= 2.0 * a.time_bandwidth {
        return Err(ConfigError::InvalidSetting(format!(
            "num_tapers ({}) must stay below 2*NW ({})",
            a.num_tapers,
            2.0 * a.time_bandwidth
        )));
    }
    Ok(())
}
