//! Per-message failure taxonomy.
//!
//! None of these stop the ingestion loop; each is recorded against the
//! message that caused it and the loop moves on.

use crate::geo::CoordinateError;
use crate::parser::ParseError;
use crate::transport::TransportError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("Coordinate transform error for vehicle {vehicle}: {source}")]
    Coordinate {
        vehicle: String,
        #[source]
        source: CoordinateError,
    },

    #[error("Unknown KV6 message types found: {}", .0.join(", "))]
    UnknownSchema(Vec<String>),
}
