//! Weather collector - Main Entry Point
//!
//! Loads configuration, wires the Open-Meteo source to the AMQP transport and
//! runs the delivery loop until SIGINT/SIGTERM. Every command returns a
//! `CollectorResult`; an error exits with status 1.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use weather_collector::config::CollectorConfig;
use weather_collector::delivery::{install_signal_handlers, DeliveryLoop, DeliverySettings};
use weather_collector::error::CollectorResult;
use weather_collector::observability::init_default_logging;
use weather_collector::source::{DataSource, OpenMeteoSource};
use weather_collector::transport::AmqpTransport;

/// Publishes current weather readings to a RabbitMQ queue
#[derive(Parser)]
#[command(name = "weather-collector")]
#[command(about = "Polls Open-Meteo and publishes readings to RabbitMQ")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "COLLECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collector (default)
    Run,
    /// Validate configuration
    Config {
        /// Show the effective configuration with secrets masked
        #[arg(long)]
        show: bool,
    },
    /// Fetch one reading and print its payload without publishing
    Fetch,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting weather collector v{}", env!("CARGO_PKG_VERSION"));

    let config = match CollectorConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_collector(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
        Commands::Fetch => fetch_once(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", e);
        process::exit(1);
    }

    info!("Application shutdown complete");
}

async fn run_collector(config: CollectorConfig) -> CollectorResult<()> {
    info!(
        host = %config.broker.host,
        port = config.broker.port,
        queue = %config.broker.queue_name,
        latitude = %config.location.latitude,
        longitude = %config.location.longitude,
        "Collector configured"
    );

    let source = OpenMeteoSource::from_config(&config)?;
    let transport = AmqpTransport::from_config(&config)?;
    let shutdown = install_signal_handlers()?;

    let delivery = DeliveryLoop::new(
        source,
        transport,
        DeliverySettings::from(&config),
        shutdown,
    );
    delivery.run().await?;
    Ok(())
}

fn handle_config_command(config: &CollectorConfig, show: bool) -> CollectorResult<()> {
    if show {
        println!("Current configuration:");
        println!("{}", config.to_redacted_toml()?);
    }

    info!("Configuration validation complete");
    Ok(())
}

async fn fetch_once(config: &CollectorConfig) -> CollectorResult<()> {
    let source = OpenMeteoSource::from_config(config)?;
    let reading = source.fetch_reading().await?;
    println!("{}", String::from_utf8_lossy(&reading.to_payload()?));
    Ok(())
}
