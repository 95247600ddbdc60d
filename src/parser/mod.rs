//! KV6 XML parsing.
//!
//! [`tree`] turns XML text into a generic [`Node`] tree; [`kv6`] extracts
//! flat [`MessageRecord`]s from the `VV_TM_PUSH/KV6posinfo` envelope.

pub mod kv6;
pub mod tree;

pub use kv6::{KNOWN_TYPES, MessageRecord, MessageType, ParseOutcome, parse_kv6};
pub use tree::{Node, parse_tree};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed document: {0}")]
    Structure(String),
}
