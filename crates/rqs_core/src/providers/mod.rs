//! Collaborator seams the analysis core consumes.
//!
//! Reading waveform files, station inventories, and phase catalogues is
//! format adaptation, not analysis; the core only sees these traits. The
//! in-memory implementations back the application's JSON dataset and the
//! tests. Every failure a provider can signal maps onto a station-level
//! skip condition.

mod travel_time;

pub use travel_time::{
    epicentral_distance_deg, CachedTravelTimes, HalfspaceModel, TravelTimeModel, TravelTimePicks,
};

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::analysis::types::{AnalysisError, AnalysisResult, Trace};
use crate::models::{Event, PhaseKind, Pick, StationCoordinates, StationKey};

/// Resolves station coordinates valid at a given time.
pub trait InventoryLookup: Send + Sync {
    fn station_coordinates(
        &self,
        station: &StationKey,
        at: DateTime<Utc>,
    ) -> AnalysisResult<StationCoordinates>;
}

/// Supplies arrival-time picks for (event, station, phase).
///
/// `Ok(None)` means no usable pick exists; errors mean a derived pick
/// could not be computed or a lookup it depends on failed. Both are skip
/// conditions at the station boundary.
pub trait PickProvider: Send + Sync {
    fn pick(
        &self,
        event: &Event,
        station: &StationKey,
        phase: PhaseKind,
    ) -> AnalysisResult<Option<Pick>>;
}

/// Resolves an event's waveform reference into per-station traces.
pub trait WaveformSource: Send + Sync {
    /// Stations that have a waveform for this event.
    fn stations_for(&self, event: &Event) -> Vec<StationKey>;

    /// A private copy of the event's trace at the station, or `None` when
    /// the station has no waveform for this event.
    fn trace(&self, event: &Event, station: &StationKey) -> Option<Trace>;
}

/// Station inventory held in memory.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    stations: HashMap<StationKey, StationCoordinates>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, station: StationKey, coordinates: StationCoordinates) {
        self.stations.insert(station, coordinates);
    }
}

impl InventoryLookup for InMemoryInventory {
    fn station_coordinates(
        &self,
        station: &StationKey,
        _at: DateTime<Utc>,
    ) -> AnalysisResult<StationCoordinates> {
        self.stations
            .get(station)
            .copied()
            .ok_or_else(|| AnalysisError::LookupFailure {
                station: station.clone(),
            })
    }
}

/// Pick catalogue held in memory, keyed by (event id, station, phase).
#[derive(Debug, Default)]
pub struct InMemoryPicks {
    picks: HashMap<(String, StationKey, PhaseKind), Pick>,
}

impl InMemoryPicks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event_id: impl Into<String>, station: StationKey, pick: Pick) {
        self.picks.insert((event_id.into(), station, pick.phase), pick);
    }
}

impl PickProvider for InMemoryPicks {
    fn pick(
        &self,
        event: &Event,
        station: &StationKey,
        phase: PhaseKind,
    ) -> AnalysisResult<Option<Pick>> {
        Ok(self
            .picks
            .get(&(event.id.clone(), station.clone(), phase))
            .cloned())
    }
}

/// Waveforms held in memory, keyed by the event's waveform reference.
#[derive(Debug, Default)]
pub struct InMemoryWaveforms {
    traces: HashMap<(String, StationKey), Trace>,
}

impl InMemoryWaveforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, waveform_ref: impl Into<String>, trace: Trace) {
        let key = (waveform_ref.into(), trace.station_key());
        self.traces.insert(key, trace);
    }
}

impl WaveformSource for InMemoryWaveforms {
    fn stations_for(&self, event: &Event) -> Vec<StationKey> {
        let stations: BTreeSet<StationKey> = self
            .traces
            .keys()
            .filter(|(reference, _)| *reference == event.waveform_ref)
            .map(|(_, station)| station.clone())
            .collect();
        stations.into_iter().collect()
    }

    fn trace(&self, event: &Event, station: &StationKey) -> Option<Trace> {
        self.traces
            .get(&(event.waveform_ref.clone(), station.clone()))
            .cloned()
    }
}

/// Tries a primary pick source first, consulting the fallback only when
/// the primary has no pick at all. Primary errors are not masked.
pub struct FallbackPicks<A, B> {
    primary: A,
    fallback: B,
}

impl<A, B> FallbackPicks<A, B> {
    pub fn new(primary: A, fallback: B) -> Self {
        Self { primary, fallback }
    }
}

impl<A: PickProvider, B: PickProvider> PickProvider for FallbackPicks<A, B> {
    fn pick(
        &self,
        event: &Event,
        station: &StationKey,
        phase: PhaseKind,
    ) -> AnalysisResult<Option<Pick>> {
        match self.primary.pick(event, station, phase)? {
            Some(pick) => Ok(Some(pick)),
            None => self.fallback.pick(event, station, phase),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(secs: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, secs).unwrap()
    }

    fn event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            magnitude: 1.0,
            latitude: 46.0,
            longitude: -122.0,
            depth_km: 5.0,
            origin_time: utc(0),
            waveform_ref: format!("wf_{id}"),
        }
    }

    fn trace(network: &str, station: &str) -> Trace {
        Trace {
            network: network.to_string(),
            station: station.to_string(),
            sample_rate: 100.0,
            start_time: utc(0),
            samples: vec![0.0; 10],
        }
    }

    #[test]
    fn inventory_miss_is_lookup_failure() {
        let inventory = InMemoryInventory::new();
        let err = inventory
            .station_coordinates(&StationKey::new("UW", "GONE"), utc(0))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::LookupFailure { .. }));
    }

    #[test]
    fn picks_return_none_when_absent() {
        let picks = InMemoryPicks::new();
        let ev = event("a");
        let got = picks
            .pick(&ev, &StationKey::new("UW", "RCM"), PhaseKind::P)
            .unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn waveforms_list_stations_per_event() {
        let mut waveforms = InMemoryWaveforms::new();
        let ev_a = event("a");
        let ev_b = event("b");
        waveforms.insert(&ev_a.waveform_ref, trace("UW", "RCM"));
        waveforms.insert(&ev_a.waveform_ref, trace("UW", "YEL"));
        waveforms.insert(&ev_b.waveform_ref, trace("UW", "RCM"));

        assert_eq!(waveforms.stations_for(&ev_a).len(), 2);
        assert_eq!(waveforms.stations_for(&ev_b).len(), 1);
        assert!(waveforms.trace(&ev_b, &StationKey::new("UW", "YEL")).is_none());
    }

    #[test]
    fn fallback_picks_consult_secondary_on_miss() {
        let ev = event("a");
        let station = StationKey::new("UW", "RCM");

        let primary = InMemoryPicks::new();
        let mut secondary = InMemoryPicks::new();
        secondary.insert(
            &ev.id,
            station.clone(),
            Pick {
                phase: PhaseKind::S,
                time: utc(12),
                source: crate::models::PickSource::PhaseFile,
            },
        );

        let provider = FallbackPicks::new(primary, secondary);
        let pick = provider.pick(&ev, &station, PhaseKind::S).unwrap().unwrap();
        assert_eq!(pick.time, utc(12));
    }
}
