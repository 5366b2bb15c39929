//! Shared configuration for the director IPC daemon.
//!
//! Settings are resolved from three layers, highest precedence first: command
//! line flags, `DIRECTOR_*` environment variables, and the built-in defaults
//! such as [`DEFAULT_PORT`]. The daemon binary calls [`Config::load`]; tests
//! build values directly or go through [`Config::load_from_iter`] with explicit
//! arguments.

mod defaults;
mod endpoint;
mod logging;

use std::ffi::OsString;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

pub use defaults::{
    DEFAULT_HOST, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_MAX_REQUEST_BYTES,
    DEFAULT_PORT, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_WRITE_TIMEOUT_SECS, VERBOSE_LOG_FILTER,
    default_log_filter, default_log_format,
};
pub use endpoint::ServerEndpoint;
pub use logging::{LogFormat, LogFormatParseError};

/// Name of the extension toggled by `--enable-ue-python`.
pub const UE_PYTHON_EXTENSION: &str = "ue-python";

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "directord",
    version,
    about = "Request-routing IPC server for the Director editor plugin"
)]
pub struct Config {
    /// Host address to bind to.
    #[arg(long, env = "DIRECTOR_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "DIRECTOR_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Tracing filter expression, e.g. `info` or `directord=debug`.
    #[arg(long, env = "DIRECTOR_LOG_FILTER", default_value = DEFAULT_LOG_FILTER)]
    pub log_filter: String,

    /// Log output format (`json` or `compact`).
    #[arg(long, env = "DIRECTOR_LOG_FORMAT", default_value_t = default_log_format())]
    pub log_format: LogFormat,

    /// Enable the Unreal Engine Python bridge handlers.
    #[arg(long = "enable-ue-python")]
    pub enable_ue_python: bool,

    /// Enable an optional handler extension by name. May be repeated.
    #[arg(long = "enable", value_name = "EXTENSION")]
    pub extensions: Vec<String>,

    /// Disable per-request performance metrics.
    #[arg(long)]
    pub disable_metrics: bool,

    /// Maximum concurrent client connections (`0` means unlimited).
    #[arg(long, env = "DIRECTOR_MAX_CONNECTIONS", default_value_t = 0)]
    pub max_connections: usize,

    /// Seconds a connection may stay idle between requests (`0` disables).
    #[arg(long, env = "DIRECTOR_IDLE_TIMEOUT_SECS", default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,

    /// Seconds a response write may block (`0` disables).
    #[arg(long, env = "DIRECTOR_WRITE_TIMEOUT_SECS", default_value_t = DEFAULT_WRITE_TIMEOUT_SECS)]
    pub write_timeout_secs: u64,

    /// Seconds open connections get to finish after shutdown begins.
    #[arg(long, env = "DIRECTOR_SHUTDOWN_GRACE_SECS", default_value_t = DEFAULT_SHUTDOWN_GRACE_SECS)]
    pub shutdown_grace_secs: u64,

    /// Largest request line accepted from a client, in bytes.
    #[arg(long, env = "DIRECTOR_MAX_REQUEST_BYTES", default_value_t = DEFAULT_MAX_REQUEST_BYTES)]
    pub max_request_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            verbose: false,
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
            enable_ue_python: false,
            extensions: Vec::new(),
            disable_metrics: false,
            max_connections: 0,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
        }
    }
}

/// Errors raised while resolving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Command line or environment values could not be parsed.
    ///
    /// This also carries clap's `--help` and `--version` requests; callers
    /// should hand the error back to clap so it can print and exit.
    #[error(transparent)]
    Arguments(#[from] clap::Error),
    /// A value parsed but is outside the accepted range.
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        /// Flag that carried the value.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter(std::env::args_os())
    }

    /// Loads configuration from explicit arguments plus the environment.
    ///
    /// The first item is treated as the binary name, as with `std::env::args`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let config = Self::try_parse_from(args)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse successfully but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending flag.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "--host",
                reason: "host must not be empty".to_owned(),
            });
        }
        if self.max_request_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "--max-request-bytes",
                reason: "limit must be greater than zero".to_owned(),
            });
        }
        Ok(())
    }

    /// Endpoint the listener binds to.
    #[must_use]
    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint::new(self.host.trim(), self.port)
    }

    /// Effective log filter; `--verbose` overrides the configured expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        if self.verbose {
            VERBOSE_LOG_FILTER
        } else {
            &self.log_filter
        }
    }

    /// Selected log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Whether request metrics are collected.
    #[must_use]
    pub const fn metrics_enabled(&self) -> bool {
        !self.disable_metrics
    }

    /// Connection cap, or `None` when unlimited.
    #[must_use]
    pub const fn max_connections(&self) -> Option<usize> {
        if self.max_connections == 0 {
            None
        } else {
            Some(self.max_connections)
        }
    }

    /// Idle deadline between requests, or `None` when disabled.
    #[must_use]
    pub const fn idle_timeout(&self) -> Option<Duration> {
        seconds(self.idle_timeout_secs)
    }

    /// Deadline for a single response write, or `None` when disabled.
    #[must_use]
    pub const fn write_timeout(&self) -> Option<Duration> {
        seconds(self.write_timeout_secs)
    }

    /// Time open connections get to drain once shutdown begins.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Largest request line accepted from a client.
    #[must_use]
    pub const fn max_request_bytes(&self) -> usize {
        self.max_request_bytes
    }

    /// Extension names requested on the command line, deduplicated in order.
    ///
    /// `--enable-ue-python` contributes [`UE_PYTHON_EXTENSION`] ahead of any
    /// `--enable` values.
    #[must_use]
    pub fn requested_extensions(&self) -> Vec<String> {
        let flagged = self
            .enable_ue_python
            .then(|| UE_PYTHON_EXTENSION.to_owned());
        let mut names: Vec<String> = Vec::new();
        for name in flagged.into_iter().chain(
            self.extensions
                .iter()
                .map(|name| name.trim().to_ascii_lowercase()),
        ) {
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

const fn seconds(value: u64) -> Option<Duration> {
    if value == 0 {
        None
    } else {
        Some(Duration::from_secs(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_wire_contract() {
        let config = Config::default();
        assert_eq!(config.endpoint(), ServerEndpoint::new("127.0.0.1", 5555));
        assert_eq!(config.log_filter(), "info");
        assert!(config.metrics_enabled());
        assert_eq!(config.max_connections(), None);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.max_request_bytes(), 1024 * 1024);
    }

    #[test]
    fn verbose_forces_debug_filter() {
        let config = Config {
            verbose: true,
            log_filter: "warn".to_owned(),
            ..Config::default()
        };
        assert_eq!(config.log_filter(), "debug");
    }

    #[test]
    fn zero_disables_optional_limits() {
        let config = Config {
            idle_timeout_secs: 0,
            write_timeout_secs: 0,
            max_connections: 0,
            ..Config::default()
        };
        assert_eq!(config.idle_timeout(), None);
        assert_eq!(config.write_timeout(), None);
        assert_eq!(config.max_connections(), None);
    }

    #[test]
    fn requested_extensions_merge_flag_and_names() {
        let config = Config {
            enable_ue_python: true,
            extensions: vec![
                "UE-Python".to_owned(),
                " rag ".to_owned(),
                String::new(),
                "rag".to_owned(),
            ],
            ..Config::default()
        };
        assert_eq!(config.requested_extensions(), vec!["ue-python", "rag"]);
    }

    #[test]
    fn rejects_zero_request_limit() {
        let config = Config {
            max_request_bytes: 0,
            ..Config::default()
        };
        let error = config.validate().expect_err("zero limit should be rejected");
        assert!(matches!(
            error,
            ConfigError::Invalid {
                field: "--max-request-bytes",
                ..
            }
        ));
    }

    #[test]
    fn rejects_blank_host() {
        let config = Config {
            host: "  ".to_owned(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
