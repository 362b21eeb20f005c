use configen::cli::run_cli;
use configen::logging::{init_logging_with_config, LogConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(err) = init_logging_with_config(&LogConfig::from_env()) {
        eprintln!("Warning: {err:#}");
    }

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
