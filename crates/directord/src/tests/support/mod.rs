//! Test harness utilities shared by the unit and behavioural suites.

mod client;
mod reporter;

use director_config::Config;

pub use client::TestClient;
pub use reporter::{HealthEvent, RecordingHealthReporter};

/// Result type returned by fallible BDD steps.
pub type StepResult = Result<(), String>;

/// Configuration bound to an ephemeral loopback port with short deadlines.
pub fn test_config() -> Config {
    Config {
        port: 0,
        idle_timeout_secs: 5,
        write_timeout_secs: 2,
        shutdown_grace_secs: 1,
        ..Config::default()
    }
}

/// Removes the quotes feature files place around string parameters.
pub fn strip_quotes(value: &str) -> &str {
    value.trim().trim_matches('"')
}
