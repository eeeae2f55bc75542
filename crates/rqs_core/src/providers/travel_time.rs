//! Travel-time model seam and memoization.
//!
//! The model is a pure function of (depth, distance, phase). The cache
//! discretizes its inputs and is safe for concurrent read/populate: a race
//! recomputes the same pure value twice, which is harmless.

use std::collections::HashMap;

use chrono::Duration;
use parking_lot::RwLock;

use crate::analysis::types::{AnalysisError, AnalysisResult};
use crate::models::{Event, PhaseKind, Pick, PickSource, StationKey};

use super::{InventoryLookup, PickProvider};

/// Pure travel-time function: `(depth km, distance deg, phase) -> seconds`.
///
/// `None` means the model cannot produce a time for these inputs.
pub trait TravelTimeModel: Send + Sync {
    fn travel_time(&self, depth_km: f64, distance_deg: f64, phase: PhaseKind) -> Option<f64>;
}

/// Cache key discretized to 0.1 km in depth and 0.01 degree in distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TravelTimeKey {
    phase: PhaseKind,
    depth_decikm: i64,
    distance_centideg: i64,
}

impl TravelTimeKey {
    fn new(depth_km: f64, distance_deg: f64, phase: PhaseKind) -> Self {
        Self {
            phase,
            depth_decikm: (depth_km * 10.0).round() as i64,
            distance_centideg: (distance_deg * 100.0).round() as i64,
        }
    }

    fn depth_km(&self) -> f64 {
        self.depth_decikm as f64 / 10.0
    }

    fn distance_deg(&self) -> f64 {
        self.distance_centideg as f64 / 100.0
    }
}

/// Read-through memoization of a travel-time model.
///
/// The model is evaluated on the discretized key so every racer computes
/// the identical value, and the write is a plain idempotent insert.
pub struct CachedTravelTimes<M> {
    model: M,
    cache: RwLock<HashMap<TravelTimeKey, Option<f64>>>,
}

impl<M: TravelTimeModel> CachedTravelTimes<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Number of memoized entries.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

impl<M: TravelTimeModel> TravelTimeModel for CachedTravelTimes<M> {
    fn travel_time(&self, depth_km: f64, distance_deg: f64, phase: PhaseKind) -> Option<f64> {
        let key = TravelTimeKey::new(depth_km, distance_deg, phase);
        if let Some(&hit) = self.cache.read().get(&key) {
            return hit;
        }
        // Compute outside any lock; the function is pure, so losing a race
        // just re-inserts the same value.
        let value = self
            .model
            .travel_time(key.depth_km(), key.distance_deg(), phase);
        self.cache.write().insert(key, value);
        value
    }
}

/// Mean great-circle kilometers per degree of arc.
const KM_PER_DEGREE: f64 = 111.19;

/// Uniform-velocity halfspace with straight-ray paths.
///
/// A stand-in for an externally supplied travel-time table; adequate for
/// the local distances repeater analysis works at.
#[derive(Debug, Clone, Copy)]
pub struct HalfspaceModel {
    /// P-wave velocity in km/s.
    pub p_velocity_km_s: f64,
    /// S-wave velocity in km/s.
    pub s_velocity_km_s: f64,
}

impl Default for HalfspaceModel {
    fn default() -> Self {
        Self {
            p_velocity_km_s: 6.0,
            s_velocity_km_s: 3.5,
        }
    }
}

impl TravelTimeModel for HalfspaceModel {
    fn travel_time(&self, depth_km: f64, distance_deg: f64, phase: PhaseKind) -> Option<f64> {
        if depth_km < 0.0 || distance_deg < 0.0 {
            return None;
        }
        let horizontal_km = distance_deg * KM_PER_DEGREE;
        let path_km = (horizontal_km * horizontal_km + depth_km * depth_km).sqrt();
        let velocity = match phase {
            PhaseKind::P => self.p_velocity_km_s,
            PhaseKind::S => self.s_velocity_km_s,
        };
        if velocity > 0.0 {
            Some(path_km / velocity)
        } else {
            None
        }
    }
}

/// Great-circle epicentral distance in degrees of arc (haversine form).
pub fn epicentral_distance_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    (2.0 * a.sqrt().atan2((1.0 - a).sqrt())).to_degrees()
}

/// Derives picks as origin time plus modelled travel time over the
/// epicentral distance to the station.
///
/// Inventory misses surface as lookup failures and model misses as
/// pick-estimation failures; both are station-level skip conditions.
pub struct TravelTimePicks<M, I> {
    model: M,
    inventory: I,
}

impl<M, I> TravelTimePicks<M, I> {
    pub fn new(model: M, inventory: I) -> Self {
        Self { model, inventory }
    }
}

impl<M: TravelTimeModel, I: InventoryLookup> PickProvider for TravelTimePicks<M, I> {
    fn pick(
        &self,
        event: &Event,
        station: &StationKey,
        phase: PhaseKind,
    ) -> AnalysisResult<Option<Pick>> {
        let coordinates = self
            .inventory
            .station_coordinates(station, event.origin_time)?;
        let distance_deg = epicentral_distance_deg(
            event.latitude,
            event.longitude,
            coordinates.latitude,
            coordinates.longitude,
        );

        match self
            .model
            .travel_time(event.depth_km, distance_deg, phase)
        {
            Some(tt) if tt.is_finite() && tt >= 0.0 => {
                let time = event.origin_time + Duration::nanoseconds((tt * 1e9).round() as i64);
                Ok(Some(Pick {
                    phase,
                    time,
                    source: PickSource::TravelTime,
                }))
            }
            Some(tt) => Err(AnalysisError::PickEstimation(format!(
                "non-physical {phase} travel time {tt} at depth {} km, distance {distance_deg:.2} deg",
                event.depth_km
            ))),
            None => Err(AnalysisError::PickEstimation(format!(
                "no {phase} travel time at depth {} km, distance {distance_deg:.2} deg",
                event.depth_km
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{TimeZone, Utc};

    use crate::models::StationCoordinates;
    use crate::providers::InMemoryInventory;

    /// Halfspace model that counts evaluations.
    struct CountingModel {
        inner: HalfspaceModel,
        calls: AtomicUsize,
    }

    impl CountingModel {
        fn new() -> Self {
            Self {
                inner: HalfspaceModel::default(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TravelTimeModel for CountingModel {
        fn travel_time(&self, depth_km: f64, distance_deg: f64, phase: PhaseKind) -> Option<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.travel_time(depth_km, distance_deg, phase)
        }
    }

    #[test]
    fn distance_of_a_quarter_arc_is_ninety_degrees() {
        let d = epicentral_distance_deg(0.0, 0.0, 0.0, 90.0);
        assert!((d - 90.0).abs() < 1e-9, "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let d1 = epicentral_distance_deg(46.2, -122.18, 46.5, -121.9);
        let d2 = epicentral_distance_deg(46.5, -121.9, 46.2, -122.18);
        assert!((d1 - d2).abs() < 1e-12);
        assert!(d1 > 0.0);
    }

    #[test]
    fn cache_evaluates_each_key_once() {
        let cached = CachedTravelTimes::new(CountingModel::new());

        let first = cached.travel_time(5.0, 0.5, PhaseKind::P);
        let second = cached.travel_time(5.0, 0.5, PhaseKind::P);
        // Within the discretization step, still the same key.
        let third = cached.travel_time(5.004, 0.5004, PhaseKind::P);

        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(cached.model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cached.len(), 1);

        cached.travel_time(5.0, 0.5, PhaseKind::S);
        assert_eq!(cached.model.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn travel_time_picks_derive_from_origin() {
        let origin = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let event = Event {
            id: "a".to_string(),
            magnitude: 1.0,
            latitude: 46.0,
            longitude: -122.0,
            depth_km: 5.0,
            origin_time: origin,
            waveform_ref: "wf_a".to_string(),
        };
        let station = StationKey::new("UW", "RCM");

        let mut inventory = InMemoryInventory::new();
        inventory.insert(
            station.clone(),
            StationCoordinates {
                latitude: 46.1,
                longitude: -122.1,
                elevation_m: 1200.0,
            },
        );

        let provider = TravelTimePicks::new(CountingModel::new(), inventory);
        let p = provider.pick(&event, &station, PhaseKind::P).unwrap().unwrap();
        let s = provider.pick(&event, &station, PhaseKind::S).unwrap().unwrap();

        assert_eq!(p.source, PickSource::TravelTime);
        assert!(p.time > origin);
        assert!(s.time > p.time, "S must arrive after P");
    }

    #[test]
    fn missing_station_fails_lookup_before_estimation() {
        let event = Event {
            id: "a".to_string(),
            magnitude: 1.0,
            latitude: 46.0,
            longitude: -122.0,
            depth_km: 5.0,
            origin_time: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            waveform_ref: "wf_a".to_string(),
        };
        let provider = TravelTimePicks::new(CountingModel::new(), InMemoryInventory::new());
        let err = provider
            .pick(&event, &StationKey::new("UW", "GONE"), PhaseKind::P)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::LookupFailure { .. }));
    }
}
