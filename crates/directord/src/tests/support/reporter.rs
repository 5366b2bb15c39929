//! Health reporter that records lifecycle events for assertions.

use std::net::SocketAddr;
use std::sync::Mutex;

use director_config::ServerEndpoint;

use crate::extensions::ExtensionError;
use crate::health::HealthReporter;
use crate::server::ServerState;
use crate::transport::ListenerError;

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Lifecycle states in the order they were entered.
    pub fn states(&self) -> Vec<ServerState> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                HealthEvent::StateChanged(state) => Some(state),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn state_changed(&self, state: ServerState) {
        self.record(HealthEvent::StateChanged(state));
    }

    fn listening(&self, _endpoint: &ServerEndpoint, address: SocketAddr) {
        self.record(HealthEvent::Listening(address));
    }

    fn bind_failed(&self, _endpoint: &ServerEndpoint, error: &ListenerError) {
        self.record(HealthEvent::BindFailed(error.to_string()));
    }

    fn extension_enabled(&self, name: &str, handlers: usize) {
        self.record(HealthEvent::ExtensionEnabled {
            name: name.to_owned(),
            handlers,
        });
    }

    fn extension_failed(&self, error: &ExtensionError) {
        self.record(HealthEvent::ExtensionFailed {
            name: error.name().to_owned(),
            message: error.to_string(),
        });
    }

    fn connections_forced(&self, count: usize) {
        self.record(HealthEvent::ConnectionsForced(count));
    }
}

/// Structured health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// The server entered a lifecycle state.
    StateChanged(ServerState),
    /// The listener is accepting on this address.
    Listening(SocketAddr),
    /// Binding failed with an error description.
    BindFailed(String),
    /// An extension installed handlers.
    ExtensionEnabled {
        /// Extension name.
        name: String,
        /// Handlers it installed.
        handlers: usize,
    },
    /// An extension could not be enabled.
    ExtensionFailed {
        /// Extension name.
        name: String,
        /// Rendered error.
        message: String,
    },
    /// Connections were closed after the grace period.
    ConnectionsForced(usize),
}
