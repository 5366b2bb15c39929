//! Structured health reporting for server lifecycle events.

use std::net::SocketAddr;
use std::sync::Arc;

use director_config::ServerEndpoint;

use crate::extensions::ExtensionError;
use crate::server::ServerState;
use crate::transport::ListenerError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked on every lifecycle transition.
    fn state_changed(&self, state: ServerState);

    /// Invoked once the listener is accepting connections.
    fn listening(&self, endpoint: &ServerEndpoint, address: SocketAddr);

    /// Invoked when the listening socket cannot be bound.
    fn bind_failed(&self, endpoint: &ServerEndpoint, error: &ListenerError);

    /// Invoked after an extension installed its handlers.
    fn extension_enabled(&self, name: &str, handlers: usize);

    /// Invoked when a requested extension could not be enabled.
    fn extension_failed(&self, error: &ExtensionError);

    /// Invoked when shutdown had to close connections after the grace period.
    fn connections_forced(&self, count: usize);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn state_changed(&self, state: ServerState) {
        (**self).state_changed(state);
    }

    fn listening(&self, endpoint: &ServerEndpoint, address: SocketAddr) {
        (**self).listening(endpoint, address);
    }

    fn bind_failed(&self, endpoint: &ServerEndpoint, error: &ListenerError) {
        (**self).bind_failed(endpoint, error);
    }

    fn extension_enabled(&self, name: &str, handlers: usize) {
        (**self).extension_enabled(name, handlers);
    }

    fn extension_failed(&self, error: &ExtensionError) {
        (**self).extension_failed(error);
    }

    fn connections_forced(&self, count: usize) {
        (**self).connections_forced(count);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn state_changed(&self, state: ServerState) {
        tracing::debug!(
            target: HEALTH_TARGET,
            event = "state_changed",
            state = %state,
            "server state changed"
        );
    }

    fn listening(&self, endpoint: &ServerEndpoint, address: SocketAddr) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listening",
            endpoint = %endpoint,
            address = %address,
            "server listening"
        );
    }

    fn bind_failed(&self, endpoint: &ServerEndpoint, error: &ListenerError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bind_failed",
            endpoint = %endpoint,
            error = %error,
            "failed to bind server endpoint"
        );
    }

    fn extension_enabled(&self, name: &str, handlers: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "extension_enabled",
            extension = name,
            handlers,
            "extension enabled"
        );
    }

    fn extension_failed(&self, error: &ExtensionError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "extension_failed",
            extension = error.name(),
            error = %error,
            "extension not enabled; continuing without it"
        );
    }

    fn connections_forced(&self, count: usize) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "connections_forced",
            count,
            "closed connections that outlived the shutdown grace period"
        );
    }
}
