//! Checks the command line > environment > default precedence.

use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use rstest::{fixture, rstest};

use director_config::{Config, ConfigError, LogFormat, ServerEndpoint};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const MANAGED_KEYS: &[&str] = &[
    "DIRECTOR_HOST",
    "DIRECTOR_PORT",
    "DIRECTOR_LOG_FILTER",
    "DIRECTOR_LOG_FORMAT",
    "DIRECTOR_MAX_CONNECTIONS",
    "DIRECTOR_IDLE_TIMEOUT_SECS",
    "DIRECTOR_WRITE_TIMEOUT_SECS",
    "DIRECTOR_SHUTDOWN_GRACE_SECS",
    "DIRECTOR_MAX_REQUEST_BYTES",
];

/// Serialises environment access and restores every managed key on drop.
struct EnvScope {
    previous: Vec<(&'static str, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvScope {
    fn new() -> Self {
        let guard = ENV_MUTEX
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = MANAGED_KEYS
            .iter()
            .map(|key| (*key, std::env::var_os(key)))
            .collect();
        for key in MANAGED_KEYS {
            // Edition 2024 marks environment mutation as unsafe; the scope
            // restores the original values in `Drop`.
            unsafe { std::env::remove_var(key) };
        }
        Self {
            previous,
            _guard: guard,
        }
    }

    fn set(&self, key: &'static str, value: &str) {
        unsafe { std::env::set_var(key, value) };
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..) {
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

#[fixture]
fn env() -> EnvScope {
    EnvScope::new()
}

#[rstest]
fn defaults_apply_without_flags_or_environment(env: EnvScope) {
    let config = Config::load_from_iter(["directord"]).expect("defaults load");
    assert_eq!(config, Config::default());
    drop(env);
}

#[rstest]
fn environment_overrides_defaults(env: EnvScope) {
    env.set("DIRECTOR_HOST", "0.0.0.0");
    env.set("DIRECTOR_PORT", "6000");
    env.set("DIRECTOR_LOG_FORMAT", "json");

    let config = Config::load_from_iter(["directord"]).expect("environment loads");
    assert_eq!(config.endpoint(), ServerEndpoint::new("0.0.0.0", 6000));
    assert_eq!(config.log_format(), LogFormat::Json);
}

#[rstest]
fn command_line_overrides_environment(env: EnvScope) {
    env.set("DIRECTOR_PORT", "6000");
    env.set("DIRECTOR_LOG_FILTER", "warn");

    let config = Config::load_from_iter([
        "directord",
        "--port",
        "7000",
        "--log-filter",
        "directord=trace",
    ])
    .expect("flags load");
    assert_eq!(config.port, 7000);
    assert_eq!(config.log_filter(), "directord=trace");
}

#[rstest]
fn verbose_flag_wins_over_filter(env: EnvScope) {
    env.set("DIRECTOR_LOG_FILTER", "error");
    let config = Config::load_from_iter(["directord", "--verbose"]).expect("flags load");
    assert_eq!(config.log_filter(), "debug");
}

#[rstest]
fn extension_flags_are_collected(env: EnvScope) {
    let config = Config::load_from_iter([
        "directord",
        "--enable-ue-python",
        "--enable",
        "rag",
        "--enable",
        "ue-python",
    ])
    .expect("flags load");
    assert_eq!(config.requested_extensions(), vec!["ue-python", "rag"]);
    drop(env);
}

#[rstest]
#[case::port_out_of_range(&["directord", "--port", "70000"])]
#[case::unknown_format(&["directord", "--log-format", "pretty"])]
#[case::unknown_flag(&["directord", "--bogus"])]
fn malformed_arguments_are_rejected(env: EnvScope, #[case] args: &[&str]) {
    let error = Config::load_from_iter(args.iter().copied()).expect_err("arguments rejected");
    assert!(matches!(error, ConfigError::Arguments(_)));
    drop(env);
}

#[rstest]
fn zero_request_limit_fails_validation(env: EnvScope) {
    let error = Config::load_from_iter(["directord", "--max-request-bytes", "0"])
        .expect_err("zero limit rejected");
    assert!(error.to_string().contains("--max-request-bytes"));
    drop(env);
}

#[rstest]
fn malformed_environment_value_is_rejected(env: EnvScope) {
    env.set("DIRECTOR_MAX_CONNECTIONS", "many");
    let error = Config::load_from_iter(["directord"]).expect_err("bad env rejected");
    assert!(matches!(error, ConfigError::Arguments(_)));
}
