//! stopguard - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Protective stop monitor for short option positions
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via STOPGUARD_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Reconcile and report without sending any orders
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Determine config path: CLI arg > STOPGUARD_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("STOPGUARD_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let mut config = stopguard_bot::AppConfig::from_file(&config_path)?;
    if args.dry_run {
        config.monitor.auto_submit = false;
    }

    stopguard_telemetry::init_logging(Some(&config.telemetry.log_level))?;
    info!("Starting stopguard v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, dry_run = args.dry_run, "Configuration loaded");

    let app = stopguard_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
