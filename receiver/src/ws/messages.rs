//! WebSocket message types.
//!
//! Decodes the payloads devices send and formats them as log lines.
//!
//! A payload is either a JSON object carrying optional `level` and `message`
//! fields, or anything else, which is logged verbatim under the `RAW` tag.
//! Decoding never fails: the raw path is an ordinary outcome.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Level used when a structured payload carries none.
pub const DEFAULT_LEVEL: &str = "INFO";

/// Tag used for payloads that could not be decoded.
pub const RAW_TAG: &str = "RAW";

/// Wire shape of a structured payload.
///
/// Unknown fields are ignored. `null` is treated like an absent field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Severity chosen by the client (e.g. "warn").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Human readable text. Non-string values are logged as JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
}

/// Result of decoding an incoming payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A JSON object with usable fields.
    Structured {
        /// Normalised, uppercased level.
        level: String,
        /// Message text, or the raw payload if none was supplied.
        message: String,
    },

    /// Anything that is not a JSON object of the expected shape.
    Raw(String),
}

impl Payload {
    /// Decodes a text payload.
    ///
    /// Invalid JSON, JSON that is not an object, and objects whose `level` is
    /// not a string all decode to [`Payload::Raw`]. A `message` that is
    /// missing or falsy (`null`, `""`, `0`, `false`) is replaced by the raw
    /// payload.
    #[must_use]
    pub fn decode(text: &str) -> Self {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => return Self::Raw(text.to_string()),
        };

        if !value.is_object() {
            return Self::Raw(text.to_string());
        }

        let msg: ClientMessage = match serde_json::from_value(value) {
            Ok(msg) => msg,
            Err(_) => return Self::Raw(text.to_string()),
        };

        let level = msg
            .level
            .filter(|l| !l.is_empty())
            .map_or_else(|| DEFAULT_LEVEL.to_string(), |l| l.to_uppercase());
        let message = msg
            .message
            .and_then(message_text)
            .unwrap_or_else(|| text.to_string());

        Self::Structured { level, message }
    }

    /// Returns the tag printed in front of the content.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Structured { level, .. } => level,
            Self::Raw(_) => RAW_TAG,
        }
    }

    /// Returns the content printed after the tag.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Structured { message, .. } => message,
            Self::Raw(text) => text,
        }
    }

    /// Returns true if the payload fell back to raw logging.
    #[must_use]
    pub const fn is_raw(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

/// Renders a `message` value, or `None` if it is falsy.
fn message_text(value: Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(ref n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

/// A timestamped, classified message ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// When the message was received.
    pub timestamp: DateTime<Utc>,
    /// Decoded payload.
    pub payload: Payload,
}

impl LogLine {
    /// Creates a log line stamped with the current instant.
    #[must_use]
    pub fn now(payload: Payload) -> Self {
        Self::at(Utc::now(), payload)
    }

    /// Creates a log line with an explicit timestamp.
    #[must_use]
    pub const fn at(timestamp: DateTime<Utc>, payload: Payload) -> Self {
        Self { timestamp, payload }
    }
}

/// Formats a timestamp as ISO-8601 UTC with millisecond precision.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            format_timestamp(&self.timestamp),
            self.payload.tag(),
            self.payload.content()
        )
    }
}
