//! Wrack CLI
//!
//! Command-line dispatcher for the wrack data-management platform.

use anyhow::Result;
use clap::Parser;

use wrack_cli::cli::{
    generate_completion, handle_db, handle_ebi, handle_maintenance, handle_ware, handle_webserver,
    Cli, Commands,
};
use wrack_cli::context::Context;
use wrack_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    // Completions need no configuration or live services.
    if let Commands::Completion { shell } = &cli.command {
        generate_completion(*shell);
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::from_env(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = match Context::connect(config).await {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: cannot reach the wrack platform services");
            eprintln!("Make sure Postgres and Redis are running and the config points at them.");
            eprintln!("Connection error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Db { command } => handle_db(&ctx, command).await,
        Commands::Ebi { command } => handle_ebi(&ctx, command).await,
        Commands::Maintenance { command } => handle_maintenance(&ctx, command).await,
        Commands::Webserver { command } => handle_webserver(&ctx, command).await,
        Commands::Ware { command } => handle_ware(command).await,
        Commands::Completion { .. } => Ok(()), // handled above
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
