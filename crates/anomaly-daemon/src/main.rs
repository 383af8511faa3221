//! Anomaly daemon - Reconciles AnomalyDetector resources
//!
//! The daemon provides:
//! - REST API for detector management
//! - Reconciliation of every declared metric on create, update and resume
//! - Periodic level-triggered resync

use anomaly_daemon::error::{DaemonError, DaemonResult};
use anomaly_daemon::{DaemonConfig, Server};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Anomaly daemon CLI
#[derive(Parser)]
#[command(name = "anomalyd")]
#[command(about = "Anomaly Operator daemon - metric anomaly reconciliation", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "ANOMALY_CONFIG")]
    config: Option<String>,

    /// Listen address, overrides the configuration file
    #[arg(short, long, env = "ANOMALY_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level, overrides the configuration file
    #[arg(long, env = "ANOMALY_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "ANOMALY_LOG_JSON")]
    json: bool,

    /// Detector manifest to resume on startup (repeatable)
    #[arg(short, long = "manifest", env = "ANOMALY_MANIFESTS", value_delimiter = ',')]
    manifests: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        resync_interval_secs = config.scheduler.resync_interval_secs,
        manifests = cli.manifests.len(),
        "Starting anomalyd"
    );

    let server = Server::new(config)?;
    server.run(cli.manifests).await
}
