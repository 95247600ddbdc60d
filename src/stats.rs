use std::collections::{BTreeMap, VecDeque};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tracing::warn;

use crate::operator::UNKNOWN_OPERATOR;

/// Traffic counters for the ingestion loop.
#[derive(Debug, Default, Clone, Serialize)]
pub struct FeedStats {
    pub total_messages: u64,

    // payload classes
    pub xml_messages: u64,
    pub binary_messages: u64,
    pub invalid_xml: u64,

    pub vehicle_updates: u64,

    #[serde(skip)]
    pub messages_by_operator: BTreeMap<String, u64>,
}

impl FeedStats {
    pub fn record_received(&mut self, operator: Option<&str>) {
        self.total_messages += 1;
        let operator = operator.unwrap_or(UNKNOWN_OPERATOR);
        *self
            .messages_by_operator
            .entry(operator.to_string())
            .or_default() += 1;
    }

    pub fn pct(part: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn xml_pct(&self) -> f64 {
        Self::pct(self.xml_messages, self.total_messages)
    }

    /// Flat, timestamped view suitable for a CSV row or a JSON log line.
    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            timestamp: Utc::now(),
            total: self.total_messages,
            xml: self.xml_messages,
            binary: self.binary_messages,
            invalid: self.invalid_xml,
            updates: self.vehicle_updates,
            by_operator: self
                .messages_by_operator
                .iter()
                .map(|(op, count)| format!("{op}: {count}"))
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub timestamp: DateTime<Utc>,
    pub total: u64,
    pub xml: u64,
    pub binary: u64,
    pub invalid: u64,
    pub updates: u64,
    pub by_operator: String,
}

pub const RECENT_ERRORS: usize = 5;

/// Fixed-size trail of the most recent errors, oldest dropped first.
#[derive(Debug, Clone)]
pub struct RecentErrors {
    entries: VecDeque<String>,
    capacity: usize,
}

impl Default for RecentErrors {
    fn default() -> Self {
        Self::with_capacity(RECENT_ERRORS)
    }
}

impl RecentErrors {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: String) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Append-only error log file. Writes are best effort.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    session_started: bool,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            session_started: false,
        }
    }

    pub fn append(&mut self, line: &str) {
        // A broken log file must never stop ingestion.
        let _ = self.try_append(line);
    }

    fn try_append(&mut self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        if !self.session_started {
            let bar = "=".repeat(40);
            writeln!(
                file,
                "\n{bar} NEW SESSION {} {bar}",
                Local::now().to_rfc3339()
            )?;
            self.session_started = true;
        }
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Error channel shared by every pipeline stage.
#[derive(Debug, Default)]
pub struct ErrorRecorder {
    recent: RecentErrors,
    log: Option<ErrorLog>,
}

impl ErrorRecorder {
    pub fn new(log: Option<ErrorLog>) -> Self {
        Self {
            recent: RecentErrors::default(),
            log,
        }
    }

    pub fn record(&mut self, message: &str) {
        warn!(error = message, "Pipeline error");
        let entry = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        if let Some(log) = self.log.as_mut() {
            log.append(&entry);
        }
        self.recent.push(entry);
    }

    pub fn recent(&self) -> Vec<String> {
        self.recent.to_vec()
    }
}
