use events::EventKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outbound frame written to a live connection: `{"type": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: Value,
}

impl Frame {
    pub fn new(event_type: impl Into<String>, message: Value) -> Self {
        Self {
            event_type: event_type.into(),
            message,
        }
    }

    pub fn for_kind(kind: EventKind, message: Value) -> Self {
        Self::new(kind.as_str(), message)
    }

    /// Serializes the frame once so fan-out can share the encoded text.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound chat frame: `{"message": <string>}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub message: String,
}

impl InboundFrame {
    /// Lenient parse: any frame that is not an object with a string `message`
    /// yields an empty message instead of an error.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(mut fields)) => match fields.remove("message") {
                Some(Value::String(message)) => Self { message },
                _ => Self::default(),
            },
            _ => Self::default(),
        }
    }
}
