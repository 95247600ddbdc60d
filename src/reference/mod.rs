//! Stop and line reference data used to enrich vehicles.
//!
//! [`ReferenceData`] hands out immutable [`ReferenceSnapshot`]s. A refresh
//! builds a complete new snapshot first and then swaps it in, so a reader
//! never sees a half-loaded table.

mod refresh;
mod source;

pub use refresh::{DEFAULT_REFRESH_INTERVAL, spawn_refresh};
pub use source::{FileSource, HttpSource, ReferenceSource};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::vehicle::Vehicle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopInfo {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub municipality: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default = "default_transport_type")]
    pub stop_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineInfo {
    pub line_number: String,
    #[serde(default)]
    pub line_name: String,
    #[serde(default = "default_transport_type")]
    pub transport_type: String,
}

fn default_transport_type() -> String {
    "bus".to_string()
}

/// On-disk/wire layout of a reference snapshot.
///
/// ```json
/// {
///   "stops": [ { "code": "50000010", "name": "Centraal", "municipality": "Utrecht" } ],
///   "lines": { "arriva": [ { "line_number": "22012", "line_name": "Leeuwarden - Sneek" } ] }
/// }
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct ReferenceFile {
    #[serde(default)]
    pub stops: Vec<StopInfo>,
    #[serde(default)]
    pub lines: HashMap<String, Vec<LineInfo>>,
}

#[derive(Debug, Default)]
pub struct ReferenceSnapshot {
    stops: HashMap<String, StopInfo>,
    lines: HashMap<String, HashMap<String, LineInfo>>,
    loaded_at: Option<DateTime<Utc>>,
}

impl ReferenceSnapshot {
    pub fn from_file(file: ReferenceFile) -> Self {
        let stops = file
            .stops
            .into_iter()
            .filter(|s| !s.code.is_empty())
            .map(|s| (s.code.clone(), s))
            .collect();

        let lines = file
            .lines
            .into_iter()
            .map(|(operator, lines)| {
                let by_number = lines
                    .into_iter()
                    .filter(|l| !l.line_number.is_empty())
                    .map(|l| (l.line_number.clone(), l))
                    .collect();
                (operator.to_lowercase(), by_number)
            })
            .collect();

        Self {
            stops,
            lines,
            loaded_at: Some(Utc::now()),
        }
    }

    pub fn stop(&self, code: &str) -> Option<&StopInfo> {
        self.stops.get(code)
    }

    /// Finds a line by exact number, falling back to NeTEx-style ids such as
    /// `ARR:Line:23117#BW:P974` whose line part equals `line`.
    pub fn line(&self, operator: &str, line: &str) -> Option<&LineInfo> {
        let lines = self.lines.get(operator)?;
        if let Some(info) = lines.get(line) {
            return Some(info);
        }
        lines.iter().find_map(|(stored, info)| {
            let (_, rest) = stored.split_once(":Line:")?;
            let number = rest.split('#').next()?;
            (number == line).then_some(info)
        })
    }

    pub fn stats(&self) -> ReferenceStats {
        ReferenceStats {
            stops: self.stops.len(),
            lines_by_operator: self
                .lines
                .iter()
                .map(|(op, lines)| (op.clone(), lines.len()))
                .collect(),
            loaded_at: self.loaded_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceStats {
    pub stops: usize,
    pub lines_by_operator: HashMap<String, usize>,
    pub loaded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ReferenceData {
    current: RwLock<Arc<ReferenceSnapshot>>,
}

impl ReferenceData {
    pub fn new(snapshot: ReferenceSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> Arc<ReferenceSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        (*guard).clone()
    }

    pub fn replace(&self, snapshot: ReferenceSnapshot) {
        let fresh = Arc::new(snapshot);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = fresh;
    }

    /// Fills stop and line names on `vehicle` where the snapshot knows them.
    pub fn enrich(&self, vehicle: &mut Vehicle) {
        let snapshot = self.snapshot();

        if vehicle.stop != "N/A" {
            if let Some(stop) = snapshot.stop(&vehicle.stop) {
                vehicle.stop_name = Some(stop.name.clone());
                vehicle.stop_municipality = Some(stop.municipality.clone());
            }
        }

        if let (Some(operator), Some(line)) = (vehicle.operator.as_deref(), vehicle.line.as_deref()) {
            if let Some(info) = snapshot.line(operator, line) {
                if !info.line_name.is_empty() {
                    vehicle.line_name = Some(info.line_name.clone());
                }
            }
        }
    }
}
