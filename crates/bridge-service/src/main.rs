//! Gateway bridge entry point
//!
//! Run with:
//! ```bash
//! cargo run -p bridge-service -- --broker stomp://localhost/ --token <token>
//! ```
//!
//! Configuration is read from the environment (and `.env`); flags override it.

use bridge_common::{
    try_init_tracing, try_init_tracing_with_config, AppError, BridgeConfig, TracingConfig,
};
use bridge_service::cli::Cli;
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            if let Err(init) = try_init_tracing() {
                eprintln!("Warning: Failed to initialize tracing: {init}");
            }
            error!(error = %e, code = e.error_code(), "Failed to load configuration");
            std::process::exit(e.exit_code());
        }
    };

    let tracing_config = TracingConfig::for_environment(config.app.env, config.debug);
    if let Err(e) = try_init_tracing_with_config(&tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    match bridge_service::app::run(config).await {
        Ok(outcome) => {
            info!(?outcome, "Gateway bridge exited");
            std::process::exit(outcome.exit_code());
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Gateway bridge failed");
            std::process::exit(e.exit_code());
        }
    }
}

fn load_config(cli: &Cli) -> Result<BridgeConfig, AppError> {
    let mut config = BridgeConfig::from_env()?;
    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}
