//! Operator CLI for the test numbering tables

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use numbering::cli::{execute, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("numbering={},sqlx=warn", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = execute(cli).await {
        tracing::error!("Command failed: {}", e);
        return Err(e);
    }

    Ok(())
}
