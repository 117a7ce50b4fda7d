//! `quarry` binary

use anyhow::Result;
use clap::Parser;
use quarry_cli::{logging::init_tracing, AppConfig, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load(cli.config.as_deref())?;

    // Initialize tracing
    init_tracing(&config)?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let output = cli.run(&config).await?;
    println!("{}", output);

    Ok(())
}
