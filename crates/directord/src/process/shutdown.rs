//! Waiting for the process to be asked to stop.

use std::io;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use signal_hook::low_level::signal_name;
use thiserror::Error;
use tracing::info;

use crate::transport::duration_millis;

use super::PROCESS_TARGET;

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError`] when the notification source cannot be
    /// installed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Blocks on SIGTERM, SIGINT, SIGQUIT and SIGHUP.
///
/// Handlers are installed on construction so a signal that arrives while the
/// server is still starting is not lost.
pub struct SystemShutdownSignal {
    signals: Mutex<Signals>,
    grace: Duration,
}

impl SystemShutdownSignal {
    /// Installs the signal handlers; `grace` is only reported in the log line.
    ///
    /// # Errors
    ///
    /// Returns [`ShutdownError::Install`] if the handlers cannot be registered.
    pub fn install(grace: Duration) -> Result<Self, ShutdownError> {
        let signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        Ok(Self {
            signals: Mutex::new(signals),
            grace,
        })
    }
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = self.signals.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(signal) = signals.forever().next() {
            info!(
                target: PROCESS_TARGET,
                signal = signal_name(signal).unwrap_or("unknown"),
                grace_ms = duration_millis(self.grace),
                "shutdown signal received"
            );
        }
        Ok(())
    }
}
