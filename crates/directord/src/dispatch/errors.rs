//! Error types for request framing and dispatch failures.
//!
//! Protocol errors (malformed JSON, oversized requests) are answered on the
//! socket with a client-facing message; transport errors end the connection.

use std::io;

use thiserror::Error;

/// Errors surfaced while reading, parsing, or answering a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Request line could not be parsed as JSON.
    #[error("malformed JSON request: {message}")]
    MalformedJson {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Request exceeds the configured size limit.
    #[error("request too large: {size} bytes exceeds {max_size} byte limit")]
    RequestTooLarge { size: usize, max_size: usize },

    /// IO error during read or write.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Response serialization failed.
    #[error("failed to serialize response: {0}")]
    SerializeResponse(#[from] serde_json::Error),
}

impl DispatchError {
    /// Creates a malformed JSON error from a serde error.
    pub fn from_json_error(source: serde_json::Error) -> Self {
        Self::MalformedJson {
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Creates a request too large error.
    pub fn request_too_large(size: usize, max_size: usize) -> Self {
        Self::RequestTooLarge { size, max_size }
    }

    /// Message written to the client for protocol errors.
    ///
    /// Returns `None` for transport failures, which cannot be reported on the
    /// same socket.
    pub fn client_message(&self) -> Option<String> {
        match self {
            Self::MalformedJson { .. } => Some("Invalid JSON format".to_owned()),
            Self::RequestTooLarge { max_size, .. } => {
                Some(format!("Request exceeds maximum size of {max_size} bytes"))
            }
            Self::Io(_) | Self::SerializeResponse(_) => None,
        }
    }
}
