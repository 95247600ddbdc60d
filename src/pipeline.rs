//! Per-message processing: decode, parse, build, enrich, file in the ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::decode::extract_xml;
use crate::error::PipelineError;
use crate::geo::{Projection, RdToWgs84};
use crate::ledger::{Bucket, VehicleLedger};
use crate::operator::operator_from_topic;
use crate::parser::parse_kv6;
use crate::reference::ReferenceData;
use crate::stats::{ErrorRecorder, FeedStats};
use crate::transport::RawMessage;
use crate::vehicle::{Vehicle, VehicleBuilder};

/// How a single message was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No XML in the payload; control frames and other non-KV6 traffic.
    Binary,
    /// XML that failed to parse or lacked the KV6 envelope.
    Invalid,
    Parsed { records: usize, vehicles: usize },
}

pub struct Pipeline<P = RdToWgs84> {
    builder: VehicleBuilder<P>,
    ledger: VehicleLedger,
    stats: FeedStats,
    errors: ErrorRecorder,
    reference: Option<Arc<ReferenceData>>,
}

impl Default for Pipeline<RdToWgs84> {
    fn default() -> Self {
        Self::new(
            VehicleBuilder::default(),
            VehicleLedger::default(),
            ErrorRecorder::default(),
        )
    }
}

impl<P: Projection> Pipeline<P> {
    pub fn new(builder: VehicleBuilder<P>, ledger: VehicleLedger, errors: ErrorRecorder) -> Self {
        Self {
            builder,
            ledger,
            stats: FeedStats::default(),
            errors,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: Arc<ReferenceData>) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn handle(&mut self, message: &RawMessage) -> Outcome {
        self.handle_at(message, Utc::now())
    }

    /// Processes one message as if received at `now`.
    pub fn handle_at(&mut self, message: &RawMessage, now: DateTime<Utc>) -> Outcome {
        let topic = message.topic_str();
        self.stats.record_received(operator_from_topic(&topic));

        let Some(xml) = extract_xml(&message.payload) else {
            self.stats.binary_messages += 1;
            trace!(topic = %topic, bytes = message.payload.len(), "Non-XML payload");
            return Outcome::Binary;
        };
        self.stats.xml_messages += 1;

        let parsed = match parse_kv6(&xml, &topic) {
            Ok(parsed) if parsed.parsed => parsed,
            Ok(_) => {
                self.stats.invalid_xml += 1;
                debug!(topic = %topic, "XML without KV6posinfo envelope");
                return Outcome::Invalid;
            }
            Err(e) => {
                self.stats.invalid_xml += 1;
                self.record_error(&PipelineError::from(e));
                return Outcome::Invalid;
            }
        };

        self.stats.vehicle_updates += parsed.records.len() as u64;
        if !parsed.unknown_types.is_empty() {
            self.record_error(&PipelineError::UnknownSchema(parsed.unknown_types.clone()));
        }

        let mut vehicles = 0;
        for record in &parsed.records {
            match self.builder.build(record, now) {
                Ok(Some(vehicle)) => {
                    self.ingest(vehicle);
                    vehicles += 1;
                }
                Ok(None) => {}
                Err(source) => {
                    let vehicle = record.get("vehiclenumber").unwrap_or("?").to_string();
                    self.record_error(&PipelineError::Coordinate { vehicle, source });
                }
            }
        }

        debug!(topic = %topic, records = parsed.records.len(), vehicles, "KV6 message processed");
        Outcome::Parsed {
            records: parsed.records.len(),
            vehicles,
        }
    }

    fn ingest(&mut self, mut vehicle: Vehicle) -> Bucket {
        if let Some(reference) = &self.reference {
            reference.enrich(&mut vehicle);
        }
        self.ledger.upsert(vehicle)
    }

    pub fn record_error(&mut self, error: &PipelineError) {
        self.errors.record(&error.to_string());
    }

    pub fn ledger(&self) -> &VehicleLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut VehicleLedger {
        &mut self.ledger
    }

    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    pub fn recent_errors(&self) -> Vec<String> {
        self.errors.recent()
    }

    pub fn get_filtered(
        &self,
        line: Option<&str>,
        limit: usize,
        bucket: Bucket,
    ) -> Vec<(&str, &Vehicle)> {
        self.ledger.get_filtered(line, limit, bucket)
    }
}
