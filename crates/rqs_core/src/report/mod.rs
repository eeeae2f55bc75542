//! Serializable scan reports.
//!
//! The canonical output of a scan: the family list plus, per pair within
//! each family, the per-station correlation and delta-sp values. The
//! structures serialize with serde; JSON is the application's format of
//! choice.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::scanner::ScanResult;
use crate::analysis::types::StationSimilarity;
use crate::models::PairId;

/// Errors writing a report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),

    #[error("failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// One qualifying pair inside a family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairReport {
    /// Canonical pair key.
    pub pair: PairId,
    /// Accepted station records for this pair.
    pub stations: Vec<StationSimilarity>,
}

/// One family with the pairwise evidence that formed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyReport {
    /// Stable family index.
    pub index: usize,
    /// Member event identifiers, sorted.
    pub events: Vec<String>,
    /// Qualifying pairs between members.
    pub pairs: Vec<PairReport>,
}

/// Full scan report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub families: Vec<FamilyReport>,
}

impl ScanReport {
    /// Assemble the report from a completed scan. Every qualifying pair
    /// joins the family that holds its members; connectivity guarantees
    /// each pair lands in exactly one family.
    pub fn from_scan(result: &ScanResult) -> Self {
        let families = result
            .families
            .iter()
            .map(|family| {
                let pairs = result
                    .pairs
                    .iter()
                    .filter(|summary| {
                        summary.qualifies() && family.events.contains(&summary.pair.first)
                    })
                    .map(|summary| PairReport {
                        pair: summary.pair.clone(),
                        stations: summary.stations.clone(),
                    })
                    .collect();
                FamilyReport {
                    index: family.index,
                    events: family.events.clone(),
                    pairs,
                }
            })
            .collect();
        Self { families }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}
