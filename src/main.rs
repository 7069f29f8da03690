//! relayd binary: configuration, wiring, and signal-driven shutdown.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use relayd::config;
use relayd::lifecycle::{signals, Shutdown};
use relayd::observability::{logging, metrics};
use relayd::ProxyServer;

/// Reverse HTTP proxy with pluggable load balancing, response caching,
/// and per-client rate limiting.
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = config::load_config(&args.config)?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        port = config.server.port,
        algorithm = %config.load_balance.algorithm,
        backends = config.load_balance.backends.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(err) => tracing::error!(
                address = %config.observability.metrics_address,
                error = %err,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(("0.0.0.0", config.server.port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::shutdown_signal().await;
        signal_shutdown.trigger();
    });

    let server = ProxyServer::new(config)?;
    server.run(listener, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
