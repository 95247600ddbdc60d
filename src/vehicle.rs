//! Vehicle entity and its construction from KV6 message records.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::config::FieldCandidates;
use crate::geo::{CoordinateError, Projection, RdToWgs84, round5};
use crate::operator::operator_from_topic;
use crate::parser::{MessageRecord, MessageType};

/// BISON occupancy level (0-6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Occupancy {
    #[default]
    Unknown,
    Empty,
    ManySeats,
    FewSeats,
    StandingOnly,
    Full,
    NotAcceptingPassengers,
}

impl Occupancy {
    /// Maps a feed code to a level; anything outside `0..=6` is `Unknown`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => Occupancy::Empty,
            "2" => Occupancy::ManySeats,
            "3" => Occupancy::FewSeats,
            "4" => Occupancy::StandingOnly,
            "5" => Occupancy::Full,
            "6" => Occupancy::NotAcceptingPassengers,
            _ => Occupancy::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Occupancy::Unknown => "Unknown",
            Occupancy::Empty => "Empty",
            Occupancy::ManySeats => "Many seats",
            Occupancy::FewSeats => "Few seats",
            Occupancy::StandingOnly => "Standing only",
            Occupancy::Full => "Full",
            Occupancy::NotAcceptingPassengers => "Not accepting passengers",
        }
    }
}

impl Serialize for Occupancy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Vehicle {
    pub id: String,
    pub line: Option<String>,
    pub journey: Option<String>,
    pub status: MessageType,
    pub stop: String,
    pub occupancy: Occupancy,
    pub lat: f64,
    pub lon: f64,
    pub timestamp: Option<String>,
    pub last_update: DateTime<Utc>,

    // reference data
    pub stop_name: Option<String>,
    pub stop_municipality: Option<String>,
    pub line_name: Option<String>,

    // journey lifecycle
    pub delay_seconds: Option<i64>,
    pub init_timestamp: Option<String>,
    pub finish_timestamp: Option<String>,
    pub finish_reason: Option<String>,

    pub operator: Option<String>,
}

/// RD value both axes carry when the vehicle has no position fix.
const NO_FIX: f64 = -1.0;

/// Builds [`Vehicle`]s from message records.
pub struct VehicleBuilder<P = RdToWgs84> {
    fields: FieldCandidates,
    projection: P,
}

impl Default for VehicleBuilder<RdToWgs84> {
    fn default() -> Self {
        Self::new(FieldCandidates::default(), RdToWgs84)
    }
}

impl<P: Projection> VehicleBuilder<P> {
    pub fn new(fields: FieldCandidates, projection: P) -> Self {
        Self { fields, projection }
    }

    /// Builds a vehicle from `record`, stamping it with `now`.
    ///
    /// Returns `Ok(None)` for records that carry no vehicle number or no
    /// position (absent, `0/0`, or the `-1/-1` no-fix marker); most
    /// non-positional KV6 messages end up here. Any other position that
    /// cannot be projected is an error for this record only.
    pub fn build(
        &self,
        record: &MessageRecord,
        now: DateTime<Utc>,
    ) -> Result<Option<Vehicle>, CoordinateError> {
        let Some(id) = record.get("vehiclenumber") else {
            return Ok(None);
        };

        let x = first_number(record, &self.fields.x).unwrap_or(0.0);
        let y = first_number(record, &self.fields.y).unwrap_or(0.0);
        if (x == 0.0 && y == 0.0) || (x == NO_FIX && y == NO_FIX) {
            return Ok(None);
        }

        let (lon, lat) = self.projection.project(x, y)?;

        let status = record.message_type.clone();
        let timestamp = record.get("timestamp").map(str::to_string);
        let stamp_or_now = || timestamp.clone().unwrap_or_else(|| now.to_rfc3339());

        let mut vehicle = Vehicle {
            id: id.to_string(),
            line: record.get("lineplanningnumber").map(str::to_string),
            journey: record.get("journeynumber").map(str::to_string),
            status: status.clone(),
            stop: record.get("userstopcode").unwrap_or("N/A").to_string(),
            occupancy: Occupancy::from_code(record.get("occupancy").unwrap_or("0")),
            lat: round5(lat),
            lon: round5(lon),
            timestamp: timestamp.clone(),
            last_update: now,
            stop_name: None,
            stop_municipality: None,
            line_name: None,
            delay_seconds: None,
            init_timestamp: None,
            finish_timestamp: None,
            finish_reason: None,
            operator: operator_from_topic(&record.topic).map(str::to_string),
        };

        match status {
            MessageType::Init => vehicle.init_timestamp = Some(stamp_or_now()),
            MessageType::Delay => vehicle.delay_seconds = self.delay_seconds(record),
            MessageType::End | MessageType::Cancel => {
                vehicle.finish_timestamp = Some(stamp_or_now());
                vehicle.finish_reason = Some(status.to_string());
            }
            _ => {}
        }

        Ok(Some(vehicle))
    }

    /// The first candidate holding a number decides; a value too large to
    /// express in seconds means no delay.
    fn delay_seconds(&self, record: &MessageRecord) -> Option<i64> {
        self.fields
            .delay
            .iter()
            .find_map(|candidate| {
                let value = parse_whole(record.get(&candidate.field)?)?;
                Some(candidate.unit.to_seconds(value))
            })
            .flatten()
    }
}

fn first_number(record: &MessageRecord, candidates: &[String]) -> Option<f64> {
    candidates
        .iter()
        .filter_map(|key| record.get(key))
        .find_map(|raw| raw.trim().parse::<f64>().ok())
}

// i64::MAX is not representable as f64; 2^63 is the first value past it.
const I64_UPPER: f64 = 9_223_372_036_854_775_808.0;

fn parse_whole(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .map(f64::round)
            .filter(|v| v.is_finite() && *v >= -I64_UPPER && *v < I64_UPPER)
            .map(|v| v as i64)
    })
}
