//! Log output for the daemon.
//!
//! Events go to stderr only; a client socket never carries log lines. The
//! subscriber is installed once per process, so the binary and the test
//! harness can both call [`initialise`] without coordinating.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};

use director_config::{Config, LogFormat};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Proof that the global subscriber is in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The filter expression did not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Expression that failed to parse.
        filter: String,
        /// Parser message.
        message: String,
    },
    /// Another subscriber was installed first.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on the first call; later calls are no-ops.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or another
/// subscriber already owns the global slot.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| OutputSettings::from_config(config).install())
        .map(|_| TelemetryHandle)
}

/// Subscriber options resolved from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputSettings {
    filter: String,
    format: LogFormat,
    ansi: bool,
}

impl OutputSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            filter: config.log_filter().to_owned(),
            format: config.log_format(),
            // No colour codes in JSON output.
            ansi: config.log_format() == LogFormat::Compact && io::stderr().is_terminal(),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        EnvFilter::try_new(&self.filter).map_err(|error| TelemetryError::Filter {
            filter: self.filter.clone(),
            message: error.to_string(),
        })
    }

    fn install(&self) -> Result<(), TelemetryError> {
        let base = fmt::Subscriber::builder()
            .with_env_filter(self.env_filter()?)
            .with_writer(io::stderr)
            .with_target(true)
            .with_level(true)
            // Worker threads are named after their peer address.
            .with_thread_names(true)
            .with_ansi(self.ansi)
            .with_timer(UtcTime::rfc_3339());

        let subscriber: Box<dyn Subscriber + Send + Sync> = match self.format {
            LogFormat::Json => Box::new(base.json().flatten_event(true).finish()),
            LogFormat::Compact => Box::new(base.compact().finish()),
        };
        tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
    }
}
