//! Kraken DCA bot - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Scheduled dollar-cost-averaging purchases on Kraken
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via KDCA_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    kdca_telemetry::init_logging()?;

    info!("Starting Kraken DCA bot v{}", env!("CARGO_PKG_VERSION"));

    let config_path = kdca_bot::AppConfig::resolve_path(args.config, |name| std::env::var(name).ok());
    info!(config_path = %config_path, "Loading configuration");

    let config = kdca_bot::AppConfig::load(&config_path)?;
    info!(
        base_currency = %config.base_currency,
        targets = config.dca_targets.len(),
        timezone = ?config.timezone,
        "Configuration loaded"
    );

    let app = kdca_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
