//! Response envelope and newline-delimited writer.
//!
//! Every response is a flat JSON object: `status`, then any handler fields,
//! then `processing_time_ms`. The writer serialises one object per line and
//! flushes after each so clients can read responses as they are produced.

use std::io::Write;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::DispatchError;

/// Keys owned by the envelope; handlers cannot override them.
const RESERVED_KEYS: [&str; 2] = ["status", "processing_time_ms"];

/// Outcome marker carried by every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The handler completed.
    Success,
    /// Parsing, routing, or the handler failed.
    Error,
}

/// A response envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    status: Status,
    #[serde(flatten)]
    fields: Map<String, Value>,
    processing_time_ms: f64,
}

impl Response {
    /// Builds a success response from handler fields.
    pub fn success(mut fields: Map<String, Value>) -> Self {
        for key in RESERVED_KEYS {
            fields.remove(key);
        }
        Self {
            status: Status::Success,
            fields,
            processing_time_ms: 0.0,
        }
    }

    /// Builds an error response carrying `message` in the `error` field.
    pub fn error(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("error".to_owned(), Value::String(message.into()));
        Self {
            status: Status::Error,
            fields,
            processing_time_ms: 0.0,
        }
    }

    /// Stamps the elapsed dispatch time, rounded to two decimals.
    #[must_use]
    pub fn with_processing_time(mut self, elapsed: Duration) -> Self {
        let millis = elapsed.as_secs_f64() * 1000.0;
        self.processing_time_ms = (millis * 100.0).round() / 100.0;
        self
    }

    /// Response status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether the request succeeded.
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// Error message, when this is an error response.
    pub fn error_message(&self) -> Option<&str> {
        self.fields.get("error").and_then(Value::as_str)
    }

    /// Looks up a handler-provided field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Elapsed dispatch time in milliseconds.
    pub fn processing_time_ms(&self) -> f64 {
        self.processing_time_ms
    }
}

/// Writer that serialises responses as JSON lines.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Creates a new response writer wrapping the given output stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a response as one JSON line and flushes.
    ///
    /// The line is serialised in full before anything is written, so a
    /// serialisation failure never leaves a partial line on the socket.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization, writing, or flushing fails.
    pub fn write_response(&mut self, response: &Response) -> Result<(), DispatchError> {
        let mut line = serde_json::to_vec(response)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }
}
