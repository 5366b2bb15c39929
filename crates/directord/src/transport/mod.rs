//! Socket listener for the daemon's TCP endpoint.
//!
//! The transport module binds the configured endpoint, accepts connections on
//! a background thread, and hands each one to a [`ConnectionHandler`] on its
//! own worker thread.

mod errors;
mod handler;
mod listener;
mod stop;
#[cfg(test)]
mod test_utils;
mod tracker;

pub use self::errors::ListenerError;
pub use self::handler::ConnectionHandler;
pub use self::listener::{ListenerHandle, SocketListener};
pub use self::stop::StopToken;
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, Counts};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Whole milliseconds in `duration` for log fields, saturating at `u64::MAX`.
pub(crate) fn duration_millis(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
