/// # docdrop
///
/// A small document server: uploads arrive as `multipart/form-data` or JSON,
/// files land in an uploads directory and their metadata in a flat JSON
/// database, and the same server hosts the static frontend.
///
/// The `run` function parses the command line, loads configuration and
/// starts the server.
pub mod cli;
pub mod config;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod http;
pub mod multipart;
pub mod response;
pub mod router;
pub mod server;
pub mod store;
pub mod utils;

use crate::cli::Cli;
use crate::config::Config;
use clap::Parser;
use log::error;

/// Initializes the logger, parses command-line arguments, and starts the server.
///
/// Configuration or server errors are logged and end the process with status 1.
pub fn run() {
    let cli = Cli::parse();

    // Load configuration with precedence: CLI > ENV > INI > Defaults
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    let log_level = if config.verbose {
        "debug"
    } else if config.detailed_logging {
        "info"
    } else {
        "warn"
    };

    // An explicit RUST_LOG wins over the configured level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    log::debug!("Log level set to: {log_level}");

    if config.verbose {
        config.print_summary();
    }

    if let Err(e) = cli.validate() {
        error!("Configuration validation error: {e}");
        std::process::exit(1);
    }

    if let Err(e) = server::run_server(config, None, None) {
        error!("Server error: {e}");
        std::process::exit(1);
    }
}
