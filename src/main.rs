//! CORS forwarding gateway.
//!
//! ```text
//!     Browser ──▶ ┌───────────┐   ┌───────────┐   ┌───────┐   ┌───────────┐   ┌──────────┐
//!                 │ validator │──▶│rate limit │──▶│ cache │──▶│ forwarder │──▶│finalizer │──▶ Browser
//!                 └───────────┘   └───────────┘   └───┬───┘   └─────┬─────┘   └────┬─────┘
//!                                                     │ HIT         │ target       │ store + log
//!                                                     ▼             ▼              ▼
//!                                                  response      upstream      background
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cors_gateway::config::validation::validate_config;
use cors_gateway::config::{load_config, ConfigError, GatewayConfig};
use cors_gateway::lifecycle::startup;

#[derive(Parser)]
#[command(name = "cors-gateway")]
#[command(about = "Allowlisting CORS gateway with rate limiting and a shared response cache", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {e}");
                return ExitCode::FAILURE;
            }
        },
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Err(errors) = validate_config(&config) {
        eprintln!("error: {}", ConfigError::Validation(errors));
        return ExitCode::FAILURE;
    }

    if cli.check {
        println!("configuration ok");
        return ExitCode::SUCCESS;
    }

    match startup::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
