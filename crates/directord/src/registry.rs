//! Request-type to handler mapping shared by every connection.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");

/// Extra response fields produced by a successful handler.
pub type HandlerFields = Map<String, Value>;

/// Outcome of a handler invocation.
pub type HandlerResult = Result<HandlerFields, HandlerError>;

/// Failure reported by a handler. The display text becomes the `error` field
/// of the response.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Generic failure with a caller-facing message.
    #[error("{message}")]
    Failed {
        /// Message sent to the client.
        message: String,
    },
    /// The request data did not have the expected shape.
    #[error("invalid payload: {message}")]
    InvalidPayload {
        /// What was wrong with the payload.
        message: String,
    },
    /// The backing service for this request type is not running.
    #[error("{service} service is not available")]
    Unavailable {
        /// Name of the missing service.
        service: String,
    },
}

impl HandlerError {
    /// Builds a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Builds an invalid payload failure.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Builds a service-unavailable failure.
    pub fn unavailable(service: impl Into<String>) -> Self {
        Self::Unavailable {
            service: service.into(),
        }
    }
}

/// Processes the `data` payload of one request type.
///
/// Handlers run on connection worker threads and may be invoked concurrently.
/// A panic inside a handler is caught by the router and reported to the
/// client as an error response.
pub trait Handler: Send + Sync + 'static {
    /// Handles one request payload.
    fn handle(&self, data: &Value) -> HandlerResult;
}

struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Value) -> HandlerResult + Send + Sync + 'static,
{
    fn handle(&self, data: &Value) -> HandlerResult {
        (self.0)(data)
    }
}

/// Thread-safe map from request type to handler.
///
/// Registration is allowed while the server is running; lookups see either
/// the old or the new handler, never a partial entry.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("HandlerRegistry")
            .field("types", &self.registered_types())
            .finish()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` for `request_type`, replacing any existing entry.
    ///
    /// Returns `true` when a previous handler was replaced.
    pub fn register<H: Handler>(&self, request_type: impl Into<String>, handler: H) -> bool {
        let request_type = request_type.into();
        let replaced = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request_type.clone(), Arc::new(handler))
            .is_some();
        if replaced {
            warn!(
                target: REGISTRY_TARGET,
                request_type = %request_type,
                "replaced existing handler"
            );
        } else {
            info!(
                target: REGISTRY_TARGET,
                request_type = %request_type,
                "registered handler"
            );
        }
        replaced
    }

    /// Installs a closure as the handler for `request_type`.
    pub fn register_fn<F>(&self, request_type: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.register(request_type, FnHandler(handler))
    }

    /// Looks up the handler for `request_type`.
    #[must_use]
    pub fn resolve(&self, request_type: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request_type)
            .cloned()
    }

    /// Whether a handler is installed for `request_type`.
    #[must_use]
    pub fn contains(&self, request_type: &str) -> bool {
        self.resolve(request_type).is_some()
    }

    /// Registered request types in lexical order.
    #[must_use]
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }
}
