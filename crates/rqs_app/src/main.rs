//! RQScan command-line entry point.
//!
//! Usage:
//!   rqscan <dataset.json> [config.toml] [report.json]
//!
//! The dataset is a JSON bundle of catalogue events, station coordinates,
//! picks, and waveforms. Stations without catalogue picks fall back to
//! travel-time-derived picks over a halfspace model. The family summary
//! goes to stdout; the optional third argument writes the full report.

use std::env;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use serde::Deserialize;

use rqs_core::analysis::{Scanner, Trace};
use rqs_core::models::{Event, Pick, StationCoordinates, StationKey};
use rqs_core::providers::{
    CachedTravelTimes, FallbackPicks, HalfspaceModel, InMemoryInventory, InMemoryPicks,
    InMemoryWaveforms, TravelTimePicks,
};
use rqs_core::report::ScanReport;
use rqs_core::{config, logging};

/// On-disk dataset bundle.
#[derive(Debug, Deserialize)]
struct Dataset {
    events: Vec<Event>,
    #[serde(default)]
    stations: Vec<StationEntry>,
    #[serde(default)]
    picks: Vec<PickEntry>,
    waveforms: Vec<WaveformEntry>,
}

#[derive(Debug, Deserialize)]
struct StationEntry {
    network: String,
    station: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    elevation_m: f64,
}

#[derive(Debug, Deserialize)]
struct PickEntry {
    event: String,
    network: String,
    station: String,
    #[serde(flatten)]
    pick: Pick,
}

#[derive(Debug, Deserialize)]
struct WaveformEntry {
    reference: String,
    #[serde(flatten)]
    trace: Trace,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();
    let Some(dataset_path) = args.get(1) else {
        eprintln!("usage: rqscan <dataset.json> [config.toml] [report.json]");
        return Err("missing dataset path".into());
    };

    let settings = match args.get(2) {
        Some(path) => config::load(path)?,
        None => config::load_or_default("rqscan.toml")?,
    };
    logging::init_tracing(&settings.logging.level);
    tracing::info!(version = rqs_core::version(), "rqscan starting");

    let dataset: Dataset = serde_json::from_reader(BufReader::new(File::open(dataset_path)?))?;
    tracing::info!(
        events = dataset.events.len(),
        waveforms = dataset.waveforms.len(),
        "dataset loaded"
    );

    let mut inventory = InMemoryInventory::new();
    for entry in &dataset.stations {
        inventory.insert(
            StationKey::new(&entry.network, &entry.station),
            StationCoordinates {
                latitude: entry.latitude,
                longitude: entry.longitude,
                elevation_m: entry.elevation_m,
            },
        );
    }

    let mut catalogue_picks = InMemoryPicks::new();
    for entry in dataset.picks {
        catalogue_picks.insert(
            entry.event,
            StationKey::new(entry.network, entry.station),
            entry.pick,
        );
    }

    let mut waveforms = InMemoryWaveforms::new();
    for entry in dataset.waveforms {
        waveforms.insert(entry.reference, entry.trace);
    }

    // Catalogue picks first; anything missing is derived from origin time
    // plus halfspace travel times, memoized across pairs.
    let travel_times = CachedTravelTimes::new(HalfspaceModel::default());
    let picks = FallbackPicks::new(
        catalogue_picks,
        TravelTimePicks::new(travel_times, inventory),
    );

    let scanner = Scanner::new(&settings, &picks, &waveforms)?;
    let result = scanner.scan(&dataset.events);

    if result.families.is_empty() {
        println!("no repeater families found");
    }
    for family in &result.families {
        println!("family {}: {}", family.index, family.events.join(", "));
    }
    for pair in result.pairs.iter().filter(|p| p.qualifies()) {
        for record in &pair.stations {
            println!(
                "  {}  {}  cc={:.3}  delta_sp={:+.4}s",
                pair.pair, record.station, record.cc_value, record.delta_sp
            );
        }
    }

    if let Some(report_path) = args.get(3) {
        ScanReport::from_scan(&result).write_json(report_path)?;
        tracing::info!(path = %report_path, "report written");
    }

    Ok(())
}
