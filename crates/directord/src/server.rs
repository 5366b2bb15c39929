//! Server lifecycle: bind, listen, stop.
//!
//! A [`Server`] owns the shared handler registry and metrics collector and
//! moves through `Created → Bound → Listening → Stopping → Stopped`. Handlers
//! may be registered in any state; connections see them as soon as the
//! registration returns.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::info;

use director_config::Config;

use crate::dispatch::{ConnectionSettings, DispatchConnectionHandler, RequestRouter};
use crate::extensions::ExtensionCatalog;
use crate::handlers::register_builtin_handlers;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::metrics::MetricsCollector;
use crate::registry::{Handler, HandlerRegistry, HandlerResult};
use crate::transport::{ListenerError, ListenerHandle, SocketListener, StopToken};

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

/// Lifecycle state of a [`Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed; no socket yet.
    Created,
    /// Listening socket bound but not accepting.
    Bound,
    /// Accept loop running.
    Listening,
    /// Shutdown in progress.
    Stopping,
    /// Shut down; the server cannot be restarted.
    Stopped,
}

impl ServerState {
    /// Lower-case state name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Bound => "bound",
            Self::Listening => "listening",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors raised by lifecycle operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or running the listener failed.
    #[error(transparent)]
    Listener(#[from] ListenerError),
    /// The operation is not valid in the current state.
    #[error("cannot {action} a server that is {state}")]
    InvalidState {
        /// Attempted operation.
        action: &'static str,
        /// State at the time of the call.
        state: ServerState,
    },
}

/// Request-routing TCP server.
pub struct Server {
    config: Config,
    registry: Arc<HandlerRegistry>,
    metrics: Option<Arc<MetricsCollector>>,
    reporter: Arc<dyn HealthReporter>,
    stop: StopToken,
    state: ServerState,
    listener: Option<SocketListener>,
    running: Option<ListenerHandle>,
    local_addr: Option<SocketAddr>,
}

impl fmt::Debug for Server {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Server")
            .field("endpoint", &self.config.endpoint())
            .field("state", &self.state)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Creates a server that reports lifecycle events through `tracing`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_reporter(config, Arc::new(StructuredHealthReporter::new()))
    }

    /// Creates a server with an explicit health reporter.
    ///
    /// The built-in `ping`, `metrics`, `query`, `plan`, and `analyze`
    /// handlers are registered immediately.
    #[must_use]
    pub fn with_reporter(config: Config, reporter: Arc<dyn HealthReporter>) -> Self {
        let registry = Arc::new(HandlerRegistry::new());
        let metrics = config
            .metrics_enabled()
            .then(|| Arc::new(MetricsCollector::new()));
        register_builtin_handlers(&registry, metrics.clone());
        reporter.state_changed(ServerState::Created);
        Self {
            config,
            registry,
            metrics,
            reporter,
            stop: StopToken::new(),
            state: ServerState::Created,
            listener: None,
            running: None,
            local_addr: None,
        }
    }

    /// Configuration the server was built from.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Shared handler registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Shared metrics collector, or `None` when metrics are disabled.
    #[must_use]
    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    /// Installs `handler` for `request_type`, replacing any existing one.
    pub fn register_handler<H: Handler>(
        &self,
        request_type: impl Into<String>,
        handler: H,
    ) -> bool {
        self.registry.register(request_type, handler)
    }

    /// Installs a closure for `request_type`, replacing any existing one.
    pub fn register_fn<F>(&self, request_type: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register_fn(request_type, handler)
    }

    /// Enables the extensions requested in the configuration.
    ///
    /// Failures are reported and skipped. Returns the names that loaded.
    pub fn enable_extensions(&self, catalog: &ExtensionCatalog) -> Vec<String> {
        let requested = self.config.requested_extensions();
        if requested.is_empty() {
            return Vec::new();
        }
        catalog.enable(&requested, &self.registry, self.reporter.as_ref())
    }

    /// Binds the listening socket without accepting connections yet.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Listener`] when the endpoint cannot be bound,
    /// or [`ServerError::InvalidState`] unless the server is freshly created.
    pub fn bind(&mut self) -> Result<SocketAddr, ServerError> {
        self.require(ServerState::Created, "bind")?;
        let endpoint = self.config.endpoint();
        let listener = SocketListener::bind(&endpoint).inspect_err(|error| {
            self.reporter.bind_failed(&endpoint, error);
        })?;
        let address = listener.local_addr();
        self.listener = Some(listener);
        self.local_addr = Some(address);
        self.transition(ServerState::Bound);
        Ok(address)
    }

    /// Starts accepting connections on a background thread, binding first if
    /// needed. Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when binding or starting the listener fails,
    /// or when the server is already listening or stopped.
    pub fn start(&mut self) -> Result<SocketAddr, ServerError> {
        if self.state == ServerState::Created {
            self.bind()?;
        }
        self.require(ServerState::Bound, "start")?;
        let listener = self.listener.take().ok_or(ServerError::InvalidState {
            action: "start",
            state: self.state,
        })?;
        let address = listener.local_addr();

        let router = Arc::new(RequestRouter::new(
            Arc::clone(&self.registry),
            self.metrics.clone(),
        ));
        let handler = Arc::new(DispatchConnectionHandler::new(
            router,
            ConnectionSettings::from_config(&self.config),
            self.stop.clone(),
        ));
        let handle = listener.start(handler, self.stop.clone(), self.config.max_connections())?;
        self.running = Some(handle);
        self.transition(ServerState::Listening);
        info!(
            target: SERVER_TARGET,
            handlers = ?self.registry.registered_types(),
            metrics = self.metrics.is_some(),
            "handlers ready"
        );
        self.reporter.listening(&self.config.endpoint(), address);
        Ok(address)
    }

    /// Address bound by [`Server::bind`] or [`Server::start`].
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Connections currently being served.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.running
            .as_ref()
            .map_or(0, ListenerHandle::active_connections)
    }

    /// Stops accepting, drains open connections for the configured grace
    /// period, and force-closes the rest. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Listener`] if the accept thread panicked. The
    /// server still ends in the `Stopped` state.
    pub fn stop(&mut self) -> Result<(), ServerError> {
        match self.state {
            ServerState::Stopping | ServerState::Stopped => return Ok(()),
            ServerState::Created | ServerState::Bound => {
                self.listener = None;
                self.stop.stop();
                self.transition(ServerState::Stopped);
                return Ok(());
            }
            ServerState::Listening => {}
        }

        self.transition(ServerState::Stopping);
        self.stop.stop();
        let mut outcome = Ok(());
        if let Some(mut handle) = self.running.take() {
            handle.shutdown();
            outcome = handle.join();
            let forced = handle.drain(self.config.shutdown_grace());
            if forced > 0 {
                self.reporter.connections_forced(forced);
            }
        }
        self.transition(ServerState::Stopped);
        outcome.map_err(ServerError::from)
    }

    fn require(&self, expected: ServerState, action: &'static str) -> Result<(), ServerError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ServerError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, state: ServerState) {
        self.state = state;
        self.reporter.state_changed(state);
    }
}
