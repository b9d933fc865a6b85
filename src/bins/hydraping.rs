//! Entry point: parses the CLI, loads config, and hands off to the runtime
//! loop, mapping every outcome to an exit code per spec §6.

use hydraping::cli::{self, Command};
use hydraping::common::{init_logging, setup_panic_handler};
use hydraping::config;
use hydraping::errors::RunError;
use hydraping::runtime::{self, ExitReason};
use tracing::error;

#[tokio::main]
async fn main() {
    setup_panic_handler();

    let args: Vec<String> = std::env::args().collect();
    match cli::parse(&args) {
        Command::Help { usage } => {
            print!("{usage}");
        }
        Command::Version => {
            println!("{} {}", env!("CARGO_BIN_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Command::Init { config_path, force } => {
            let path = match resolve_path(config_path) {
                Ok(p) => p,
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(2);
                }
            };
            match config::init(&path, force) {
                Ok(()) => println!("wrote a default config to {}", path.display()),
                Err(hydraping::errors::ConfigError::AlreadyExists { path }) => {
                    println!("a config file already exists at {path}, leaving it in place (use --force to overwrite)");
                }
                Err(e) => {
                    eprintln!("{e}");
                    std::process::exit(2);
                }
            }
        }
        Command::Run { config_path, overrides } => {
            let _guard = init_logging(tracing::Level::INFO);
            let exit_code = run(config_path, overrides).await;
            std::process::exit(exit_code);
        }
    }
}

async fn run(config_path: Option<String>, overrides: runtime::Overrides) -> i32 {
    let path = match resolve_path(config_path) {
        Ok(p) => p,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            return RunError::from(e).exit_code();
        }
    };

    let config = match config::load(&path) {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            return RunError::from(e).exit_code();
        }
    };

    let endpoints = match config.endpoints() {
        Ok(e) => e,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            return RunError::from(e).exit_code();
        }
    };

    match runtime::run(config, endpoints, overrides).await {
        Ok(ExitReason::Interrupted) => 130,
        Ok(ExitReason::Other) => 0,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            e.exit_code()
        }
    }
}

fn resolve_path(config_path: Option<String>) -> Result<std::path::PathBuf, hydraping::errors::ConfigError> {
    match config_path {
        Some(p) => Ok(std::path::PathBuf::from(p)),
        None => config::default_config_path(),
    }
}
