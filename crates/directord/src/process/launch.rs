//! Supervises server launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use director_config::Config;

use crate::extensions::ExtensionCatalog;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::server::Server;
use crate::telemetry;

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to run the server to completion.
pub struct LaunchPlan<S> {
    /// Resolved configuration.
    pub config: Config,
    /// Lifecycle observer.
    pub reporter: Arc<dyn HealthReporter>,
    /// Extensions that may be enabled by name.
    pub catalog: ExtensionCatalog,
    /// Blocks until the server should stop.
    pub shutdown: S,
}

/// Runs the server with the production collaborators until a termination
/// signal arrives.
///
/// # Errors
///
/// Returns [`LaunchError`] when telemetry, signal installation, or binding
/// fails.
pub fn run_server(config: Config) -> Result<(), LaunchError> {
    telemetry::initialise(&config)?;
    let shutdown = SystemShutdownSignal::install(config.shutdown_grace())?;
    run_server_with(LaunchPlan {
        config,
        reporter: Arc::new(StructuredHealthReporter::new()),
        catalog: ExtensionCatalog::builtin(),
        shutdown,
    })
}

/// Runs the server with injected collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when any startup step fails or the shutdown
/// listener errors. The server is stopped before a shutdown error is
/// returned.
pub fn run_server_with<S: ShutdownSignal>(plan: LaunchPlan<S>) -> Result<(), LaunchError> {
    let LaunchPlan {
        config,
        reporter,
        catalog,
        shutdown,
    } = plan;
    telemetry::initialise(&config)?;
    info!(
        target: PROCESS_TARGET,
        endpoint = %config.endpoint(),
        "starting server runtime"
    );

    let mut server = Server::with_reporter(config, reporter);
    server.enable_extensions(&catalog);
    let address = server.start()?;
    info!(
        target: PROCESS_TARGET,
        address = %address,
        "server ready; waiting for shutdown signal"
    );

    let waited = shutdown.wait();
    if let Err(error) = &waited {
        warn!(
            target: PROCESS_TARGET,
            error = %error,
            "shutdown listener failed; stopping server"
        );
    }
    server.stop()?;
    waited?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
