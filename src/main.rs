//! Churn Analysis API - Main Entry Point
//!
//! Trains a churn classifier from tabular CSV data and serves predictions
//! over a REST API.

use clap::Parser;
use churn_api::cli::{cmd_serve, cmd_train, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "churn_api=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Train {
            data,
            target,
            output,
        }) => {
            cmd_train(&data, target.as_deref(), &output)?;
        }
        Some(Commands::Serve { port, host }) => {
            cmd_serve(&host, port).await?;
        }
        None => {
            // Default: serve with env-derived config
            cmd_serve("0.0.0.0", 8000).await?;
        }
    }

    Ok(())
}
