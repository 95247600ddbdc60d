//! Field-name tables used when reading KV6 records.
//!
//! Feeds from different operators do not always agree on field names, so each
//! logical value is looked up through an ordered list of candidate keys. The
//! first candidate whose value parses as a number wins.
//!
//! The tables can be overridden from a JSON file:
//! ```json
//! {
//!   "x": ["rd-x", "rdx", "x"],
//!   "y": ["rd-y", "rdy", "y"],
//!   "delay": [
//!     { "field": "punctuality", "unit": "seconds" },
//!     { "field": "delayminutes", "unit": "minutes" }
//!   ]
//! }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Unit of a delay value as carried in the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Seconds,
    Minutes,
}

impl DelayUnit {
    /// Converts `value` to seconds; `None` when the result does not fit.
    pub fn to_seconds(self, value: i64) -> Option<i64> {
        match self {
            DelayUnit::Seconds => Some(value),
            DelayUnit::Minutes => value.checked_mul(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayField {
    pub field: String,
    pub unit: DelayUnit,
}

impl DelayField {
    fn new(field: &str, unit: DelayUnit) -> Self {
        Self {
            field: field.to_string(),
            unit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldCandidates {
    pub x: Vec<String>,
    pub y: Vec<String>,
    pub delay: Vec<DelayField>,
}

impl Default for FieldCandidates {
    fn default() -> Self {
        Self {
            x: vec!["rd-x".into(), "rdx".into(), "x".into()],
            y: vec!["rd-y".into(), "rdy".into(), "y".into()],
            delay: vec![
                DelayField::new("punctuality", DelayUnit::Seconds),
                DelayField::new("delay", DelayUnit::Seconds),
                DelayField::new("delayminutes", DelayUnit::Minutes),
                DelayField::new("delaytime", DelayUnit::Seconds),
            ],
        }
    }
}

impl FieldCandidates {
    /// Loads candidate tables from a JSON file; omitted tables keep their
    /// defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
