//! Dead-letter namespace.
//!
//! An event that exhausts its delivery retries is parked in the outbox under
//! a `DEAD_LETTER_`-prefixed type, wrapping the original event verbatim so an
//! operator can replay it.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Type prefix marking a parked event.
pub const DEAD_LETTER_PREFIX: &str = "DEAD_LETTER_";

/// Build the dead-letter type for an original event type.
pub fn dead_letter_type(original: &str) -> String {
    format!("{DEAD_LETTER_PREFIX}{original}")
}

/// True if the type names a parked event.
pub fn is_dead_letter(event_type: &str) -> bool {
    event_type.starts_with(DEAD_LETTER_PREFIX)
}

/// The original event type, if `event_type` is dead-letter-prefixed.
pub fn original_type(event_type: &str) -> Option<&str> {
    event_type.strip_prefix(DEAD_LETTER_PREFIX)
}

/// Payload of a dead-letter row.
///
/// The original event content must be recoverable byte-for-byte, so the
/// original payload is embedded untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetterPayload {
    pub original_event_type: String,
    pub original_payload: JsonValue,
    pub failure_reason: String,
}

impl DeadLetterPayload {
    pub fn new(
        original_event_type: impl Into<String>,
        original_payload: JsonValue,
        failure_reason: impl Into<String>,
    ) -> Self {
        Self {
            original_event_type: original_event_type.into(),
            original_payload,
            failure_reason: failure_reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_roundtrip() {
        let dl = dead_letter_type("campaign.close.settlement");
        assert!(is_dead_letter(&dl));
        assert_eq!(original_type(&dl), Some("campaign.close.settlement"));
        assert!(!is_dead_letter("campaign.close.settlement"));
        assert_eq!(original_type("campaign.close.settlement"), None);
    }

    #[test]
    fn payload_preserves_original_verbatim() {
        let original = serde_json::json!({"a": 1, "nested": {"b": [1, 2, 3]}});
        let wrapped = DeadLetterPayload::new("X", original.clone(), "boom");

        let json = serde_json::to_value(&wrapped).unwrap();
        let back: DeadLetterPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.original_payload, original);
        assert_eq!(back.original_event_type, "X");
    }
}
