//! Record extraction from the KV6 position envelope.

use std::collections::HashMap;
use std::fmt;

use serde::{Serialize, Serializer};

use super::tree::{ATTR_PREFIX, Node, TEXT_KEY, parse_tree};
use super::ParseError;

/// BISON/TMI8 journey status carried by a KV6 sub-element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    Arrival,
    Departure,
    OnRoute,
    OnStop,
    OffRoute,
    Init,
    Delay,
    End,
    Cancel,
    Other(String),
}

impl MessageType {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "ARRIVAL" => MessageType::Arrival,
            "DEPARTURE" => MessageType::Departure,
            "ONROUTE" => MessageType::OnRoute,
            "ONSTOP" => MessageType::OnStop,
            "OFFROUTE" => MessageType::OffRoute,
            "INIT" => MessageType::Init,
            "DELAY" => MessageType::Delay,
            "END" => MessageType::End,
            "CANCEL" => MessageType::Cancel,
            other => MessageType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Arrival => "ARRIVAL",
            MessageType::Departure => "DEPARTURE",
            MessageType::OnRoute => "ONROUTE",
            MessageType::OnStop => "ONSTOP",
            MessageType::OffRoute => "OFFROUTE",
            MessageType::Init => "INIT",
            MessageType::Delay => "DELAY",
            MessageType::End => "END",
            MessageType::Cancel => "CANCEL",
            MessageType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Sub-element tags extracted from `KV6posinfo`, in extraction order.
pub const KNOWN_TYPES: &[&str] = &[
    "ARRIVAL",
    "DEPARTURE",
    "ONROUTE",
    "ONSTOP",
    "OFFROUTE",
    "INIT",
    "DELAY",
    "END",
    "CANCEL",
];

/// One KV6 sub-element flattened to its scalar fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRecord {
    pub message_type: MessageType,
    pub topic: String,
    pub fields: HashMap<String, String>,
}

impl MessageRecord {
    pub fn new(message_type: MessageType, topic: impl Into<String>) -> Self {
        Self {
            message_type,
            topic: topic.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct ParseOutcome {
    /// `false` when the document has no `VV_TM_PUSH/KV6posinfo` element.
    pub parsed: bool,
    pub records: Vec<MessageRecord>,
    /// Sub-element tags present in the envelope but not in [`KNOWN_TYPES`].
    pub unknown_types: Vec<String>,
}

/// Parses a KV6 push document into message records.
///
/// A well-formed document without the KV6 envelope is not an error: it
/// yields an outcome with `parsed == false` and no records.
pub fn parse_kv6(xml: &str, topic: &str) -> Result<ParseOutcome, ParseError> {
    let tree = parse_tree(xml)?;

    let Some(posinfo) = tree
        .get("VV_TM_PUSH")
        .and_then(|push| push.get("KV6posinfo"))
    else {
        return Ok(ParseOutcome::default());
    };

    let mut outcome = ParseOutcome {
        parsed: true,
        ..Default::default()
    };

    for envelope in posinfo.as_list() {
        let Some(children) = envelope.as_map() else {
            continue;
        };

        let mut unknown: Vec<&String> = children
            .keys()
            .filter(|k| !k.starts_with(ATTR_PREFIX) && k.as_str() != TEXT_KEY)
            .filter(|k| !KNOWN_TYPES.contains(&k.as_str()))
            .collect();
        unknown.sort();
        for tag in unknown {
            if !outcome.unknown_types.contains(tag) {
                outcome.unknown_types.push(tag.clone());
            }
        }

        for tag in KNOWN_TYPES {
            let Some(node) = children.get(*tag) else {
                continue;
            };
            for element in node.as_list() {
                if let Some(record) = flatten(element, tag, topic) {
                    outcome.records.push(record);
                }
            }
        }
    }

    Ok(outcome)
}

fn flatten(element: &Node, tag: &str, topic: &str) -> Option<MessageRecord> {
    let map = element.as_map()?;
    let fields = map
        .iter()
        .filter_map(|(k, v)| v.as_scalar().map(|s| (k.clone(), s.to_string())))
        .collect();

    Some(MessageRecord {
        message_type: MessageType::from_tag(tag),
        topic: topic.to_string(),
        fields,
    })
}
