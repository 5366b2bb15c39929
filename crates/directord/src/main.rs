use std::process::ExitCode;

use director_config::{Config, ConfigError};

fn main() -> ExitCode {
    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::Arguments(error)) => error.exit(),
        Err(error) => {
            eprintln!("directord: {error}");
            return ExitCode::FAILURE;
        }
    };
    match directord::run_server(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("directord: {error}");
            ExitCode::FAILURE
        }
    }
}
