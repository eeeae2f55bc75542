//! Catalogue data model: events, picks, and station identity.
//!
//! Everything here is immutable after load. Pairwise computations borrow
//! these values; they never own or mutate them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seismic phase analyzed for pairwise timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseKind {
    P,
    S,
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseKind::P => write!(f, "P"),
            PhaseKind::S => write!(f, "S"),
        }
    }
}

/// Where an arrival-time pick came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PickSource {
    /// Pick carried by the event catalogue itself.
    #[default]
    Catalogue,
    /// Pick read from an external phase file.
    PhaseFile,
    /// Pick produced by an automatic picker.
    AutoPicker,
    /// Pick derived from origin time plus a travel-time model.
    TravelTime,
}

/// An arrival-time pick for one (event, station, phase).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    /// Phase the arrival belongs to.
    pub phase: PhaseKind,
    /// Arrival time.
    pub time: DateTime<Utc>,
    /// Source attribution.
    #[serde(default)]
    pub source: PickSource,
}

/// Network + station identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationKey {
    pub network: String,
    pub station: String,
}

impl StationKey {
    pub fn new(network: impl Into<String>, station: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
        }
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.network, self.station)
    }
}

/// Station coordinates resolved from an inventory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StationCoordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Elevation above sea level in meters.
    pub elevation_m: f64,
}

/// A catalogue event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Catalogue identifier, unique within a run.
    pub id: String,
    /// Preferred magnitude.
    pub magnitude: f64,
    /// Epicenter latitude in decimal degrees.
    pub latitude: f64,
    /// Epicenter longitude in decimal degrees.
    pub longitude: f64,
    /// Hypocenter depth in kilometers.
    pub depth_km: f64,
    /// Origin time.
    pub origin_time: DateTime<Utc>,
    /// Key resolving this event's waveforms in the waveform source.
    pub waveform_ref: String,
}

/// Unordered pair of event identifiers, stored in sorted order so that
/// `(a, b)` and `(b, a)` map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairId {
    pub first: String,
    pub second: String,
}

impl PairId {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                first: a.to_string(),
                second: b.to_string(),
            }
        } else {
            Self {
                first: b.to_string(),
                second: a.to_string(),
            }
        }
    }
}

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.second)
    }
}

/// Signed elapsed seconds from `earlier` to `later`.
pub fn seconds_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 * 1e-9,
        // Spans beyond ~292 years overflow the nanosecond count; fall back
        // to millisecond resolution, which is ample at that scale.
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}
