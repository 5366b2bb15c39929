use crate::logging::LogFormat;

/// Default interface the daemon binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default TCP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 5555;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter forced by `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "debug";

/// Seconds a connection may sit idle between requests before it is closed.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Seconds a single response write may block before the connection is dropped.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 30;

/// Seconds in-flight connections get to finish after a stop request.
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 5;

/// Largest request line accepted from a client, in bytes.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Default log filter expression used by the binary.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binary.
///
/// Compact output suits an editor-spawned backend whose stderr is usually
/// shown to a person rather than shipped to a log pipeline.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}
