//! Server setup and lifecycle management

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::manifest::load_manifest;
use crate::scheduler::{Scheduler, Trigger};
use crate::storage::InMemoryStorage;
use anomaly_control::{PipelineExecutor, ReconciliationController};
use anomaly_detect::NormalizingDetector;
use anomaly_sources::HttpMetricSourceClient;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

/// Anomaly daemon server
pub struct Server {
    config: DaemonConfig,
    storage: Arc<InMemoryStorage>,
    scheduler: Arc<Scheduler>,
    trigger_rx: mpsc::Receiver<Trigger>,
}

impl Server {
    /// Wire the reconciliation stack from configuration
    pub fn new(config: DaemonConfig) -> DaemonResult<Self> {
        let client = HttpMetricSourceClient::new(config.pipeline.source_config())
            .map_err(|e| DaemonError::Config(format!("Failed to build HTTP client: {}", e)))?;

        tracing::info!(
            backends = ?client.registry().ids(),
            "Registered metric backends"
        );

        let detector = NormalizingDetector::new(Arc::new(config.detection.engine()));
        let executor = PipelineExecutor::new(
            Arc::new(client),
            Arc::new(detector),
            config.pipeline.pipeline_config(),
        );
        let controller = ReconciliationController::new(Arc::new(executor))
            .with_max_concurrency(config.pipeline.max_concurrency);

        let storage = Arc::new(InMemoryStorage::new());
        let (scheduler, trigger_rx) =
            Scheduler::new(config.scheduler.clone(), storage.clone(), controller);

        Ok(Self {
            config,
            storage,
            scheduler,
            trigger_rx,
        })
    }

    /// Run until shutdown. Every manifest is stored and resumed first.
    pub async fn run(self, manifests: Vec<PathBuf>) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        // fail startup before serving anything
        let mut specs = Vec::with_capacity(manifests.len());
        for path in &manifests {
            specs.push(load_manifest(path).await?);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let scheduler_handle = tokio::spawn(
            self.scheduler
                .clone()
                .start(self.trigger_rx, shutdown_rx),
        );

        for spec in specs {
            let stored = self.scheduler.resume(spec).await?;
            tracing::info!(resource = %stored.key(), "Resuming detector from manifest");
        }

        let state = AppState::new(self.storage.clone(), self.scheduler.clone());
        let app = create_router(state, self.config.server.enable_cors);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Anomaly daemon listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Anomaly daemon shutting down");

        let _ = shutdown_tx.send(true);
        if let Err(e) = scheduler_handle.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }

        Ok(())
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
