//! Response envelope serialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One response to one request, serialized as a single JSON line.
///
/// Exactly one of `result` and `error` carries data for commands that
/// produce output; both are `null` only for informational responses with no
/// payload. The command name is echoed back so clients can correlate
/// responses without tracking request order.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Response {
    /// Echoed command name.
    #[serde(rename = "CMD")]
    pub command: String,
    /// Result payload on success, `null` otherwise.
    pub result: Option<Value>,
    /// Error message on failure, `null` otherwise.
    pub error: Option<String>,
}

impl Response {
    /// Builds a success response carrying a serializable payload.
    ///
    /// The payload types in this crate serialize infallibly; a payload that
    /// somehow fails collapses to `null` rather than breaking the wire.
    #[must_use]
    pub fn success(command: impl Into<String>, payload: impl Serialize) -> Self {
        let result = serde_json::to_value(payload).unwrap_or(Value::Null);
        Self {
            command: command.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response carrying a message.
    #[must_use]
    pub fn failure(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            result: None,
            error: Some(message.into()),
        }
    }

    /// Fixed response for requests that fail protocol-level parsing.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::failure("unknown", "Parsing error: colon not found")
    }

    /// Serializes the response as a single JSON line, newline included.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            // Value and String cannot fail to serialize; keep the wire
            // well-formed regardless.
            r#"{"CMD":"unknown","result":null,"error":"serialization failure"}"#.to_owned()
        });
        line.push('\n');
        line
    }

    /// Decodes a response from one received line.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error when the line is not a
    /// well-formed response object.
    pub fn decode(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }

    /// True when the response carries an error message.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
