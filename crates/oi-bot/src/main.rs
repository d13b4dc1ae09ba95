//! Open-interest surveillance service - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Open-interest surveillance service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via OI_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    oi_telemetry::init_logging()?;

    info!("Starting oi-bot v{}", env!("CARGO_PKG_VERSION"));

    let config = oi_bot::AppConfig::load(args.config.as_deref())?;
    info!(
        streams = config.streams.len(),
        historical_interval_secs = config.historical.interval_secs,
        current_interval_secs = config.current.interval_secs,
        "Configuration loaded"
    );

    let app = oi_bot::Application::connect(config).await?;
    app.run().await?;

    Ok(())
}
