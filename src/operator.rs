//! NDOV operator codes and topic naming.

/// Operator name to topic code, as used in `/<CODE>/<MessageType>` topics.
pub static OPERATORS: &[(&str, &str)] = &[
    ("arriva", "ARR"),
    ("connexxion", "CXX"),
    ("gvb", "GVB"),
    ("htm", "HTM"),
    ("ns", "NS"),
    ("ret", "RET"),
    ("syntus", "SYN"),
    ("veolia", "VTN"),
    ("qbuzz", "QBUZZ"),
];

pub const DEFAULT_MESSAGE_TYPE: &str = "KV6posinfo";

/// Label used for traffic whose topic carries no known operator code.
pub const UNKNOWN_OPERATOR: &str = "unknown";

/// Looks up the operator name for a topic such as `/ARR/KV6posinfo`.
pub fn operator_from_topic(topic: &str) -> Option<&'static str> {
    let code = topic.strip_prefix('/')?.split('/').next()?;
    OPERATORS
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

/// Builds the subscription topic for an operator name (case-insensitive).
pub fn topic_for(operator: &str, message_type: &str) -> Option<String> {
    let operator = operator.to_lowercase();
    OPERATORS
        .iter()
        .find(|(name, _)| *name == operator)
        .map(|(_, code)| format!("/{code}/{message_type}"))
}

pub fn all_topics(message_type: &str) -> Vec<String> {
    OPERATORS
        .iter()
        .map(|(_, code)| format!("/{code}/{message_type}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_from_topic() {
        assert_eq!(operator_from_topic("/ARR/KV6posinfo"), Some("arriva"));
        assert_eq!(operator_from_topic("/QBUZZ/KV6posinfo"), Some("qbuzz"));
        assert_eq!(operator_from_topic("/XYZ/KV6posinfo"), None);
        assert_eq!(operator_from_topic("ARR/KV6posinfo"), None);
        assert_eq!(operator_from_topic(""), None);
    }

    #[test]
    fn test_topic_for() {
        assert_eq!(
            topic_for("Arriva", DEFAULT_MESSAGE_TYPE).as_deref(),
            Some("/ARR/KV6posinfo")
        );
        assert_eq!(topic_for("nobody", DEFAULT_MESSAGE_TYPE), None);
    }

    #[test]
    fn test_all_topics_cover_every_operator() {
        let topics = all_topics(DEFAULT_MESSAGE_TYPE);
        assert_eq!(topics.len(), OPERATORS.len());
        assert!(topics.contains(&"/VTN/KV6posinfo".to_string()));
    }
}
