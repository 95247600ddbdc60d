//! Presentation of ledger and traffic state.
//!
//! Summaries go out through `tracing`; stats snapshots can also be appended
//! to a CSV file.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::ledger::{Bucket, VehicleLedger};
use crate::stats::{FeedStats, StatsSummary};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs bucket sizes, traffic counters and the recent error trail.
pub fn log_summary(ledger: &VehicleLedger, stats: &FeedStats, errors: &[String]) {
    let counts = ledger.counts();
    info!(
        active = counts.active,
        initialized = counts.initialized,
        finished = counts.finished,
        total = stats.total_messages,
        xml = stats.xml_messages,
        xml_pct = stats.xml_pct(),
        binary = stats.binary_messages,
        invalid = stats.invalid_xml,
        updates = stats.vehicle_updates,
        by_operator = %stats.summary().by_operator,
        "Feed status"
    );
    for error in errors {
        warn!(error = %error, "Recent error");
    }
}

/// Logs one line per vehicle in `bucket`, filtered and limited like the
/// ledger query.
pub fn log_vehicles(ledger: &VehicleLedger, line: Option<&str>, limit: usize, bucket: Bucket) {
    for (id, v) in ledger.get_filtered(line, limit, bucket) {
        info!(
            bucket = %bucket,
            vehicle = id,
            line = v.line.as_deref().unwrap_or("-"),
            line_name = v.line_name.as_deref().unwrap_or(""),
            status = %v.status,
            stop = v.stop_name.as_deref().unwrap_or(&v.stop),
            occupancy = v.occupancy.label(),
            lat = v.lat,
            lon = v.lon,
            delay_seconds = v.delay_seconds,
            updated = %v.last_update.format("%H:%M:%S"),
            "Vehicle"
        );
    }
}

/// Logs the vehicles of a bucket as pretty-printed JSON.
pub fn log_json(ledger: &VehicleLedger, bucket: Bucket) -> Result<()> {
    let vehicles: Vec<_> = ledger
        .get_filtered(None, 0, bucket)
        .into_iter()
        .map(|(_, v)| v)
        .collect();
    debug!("{}", serde_json::to_string_pretty(&vehicles)?);
    Ok(())
}

/// Appends a [`StatsSummary`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, summary: &StatsSummary) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(summary)?;
    writer.flush()?;

    Ok(())
}
