//! Homewatch CLI
//!
//! Command-line interface for the home environment monitoring dashboard.

use std::path::PathBuf;

use clap::Parser;
use homewatch::{load_config, Config, HomewatchBuilder};
use tracing::Level;

#[derive(Parser)]
#[command(name = "homewatch")]
#[command(about = "Home environment monitoring dashboard")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dashboard port (overrides config file)
    #[arg(long)]
    dashboard_port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, dashboard_port={:?}, log_level={:?}",
        args.config,
        args.dashboard_port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    config.resolve_secrets()?;

    if let Some(dashboard_port) = args.dashboard_port {
        config.dashboard.port = dashboard_port;
    }

    tracing::info!("Starting homewatch service");
    tracing::debug!(
        "Channel: {}, Fields: {}, Overflow: {:?}",
        config.channel.type_name(),
        config.fields.watch.len(),
        config.classifier.overflow
    );

    HomewatchBuilder::new(config).build().await?.start().await?;

    Ok(())
}
