//! Telemetry server listener
//!
//! Binds the HTTP surface and owns the fan-out hub's lifetime.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;

use super::config::ServerConfig;
use super::{router, AppState};
use crate::error::Result;
use crate::hub::FanoutHub;
use crate::ingest::IngestionPipeline;
use crate::store::{AlertLog, DeviceDirectory, EntityStateStore, GeofenceLookup};
use crate::zone::ZoneViolationChecker;

/// Telemetry ingestion and live fan-out server
pub struct TelemetryServer {
    config: ServerConfig,
    state: AppState,
}

impl TelemetryServer {
    /// Create a new server over the given collaborators
    ///
    /// Spawns the hub worker, so it must be called inside a Tokio runtime.
    pub fn new(
        config: ServerConfig,
        directory: Arc<dyn DeviceDirectory>,
        entity_state: Arc<dyn EntityStateStore>,
        geofences: Arc<dyn GeofenceLookup>,
        alerts: Arc<dyn AlertLog>,
    ) -> Self {
        let (hub, _worker) = FanoutHub::spawn(config.hub.clone());
        let checker = Arc::new(ZoneViolationChecker::new(geofences, alerts, hub.clone()));
        let pipeline = IngestionPipeline::new(directory, entity_state, hub.clone(), checker);

        let state = AppState::new(Arc::new(pipeline), hub)
            .viewer_idle_timeout(config.viewer_idle_timeout);

        Self { config, state }
    }

    /// Create a new server backed by one store implementing every collaborator
    pub fn with_store<S>(config: ServerConfig, store: Arc<S>) -> Self
    where
        S: DeviceDirectory + EntityStateStore + GeofenceLookup + AlertLog + 'static,
    {
        Self::new(config, store.clone(), store.clone(), store.clone(), store)
    }

    /// Get the fan-out hub handle
    pub fn hub(&self) -> &FanoutHub {
        &self.state.hub
    }

    /// Build the router without binding
    pub fn router(&self) -> Router {
        router(self.state.clone(), self.config.max_body_bytes)
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server fails.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Telemetry server listening");

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// The hub is stopped as soon as the signal arrives, which closes every
    /// viewer stream so open WebSocket sessions do not hold up the drain.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(addr = ?listener.local_addr().ok(), "Telemetry server listening");

        let hub = self.state.hub.clone();
        let signal = async move {
            shutdown.await;
            tracing::info!("Shutdown signal received");
            if let Err(e) = hub.shutdown().await {
                tracing::debug!(error = %e, "Hub already stopped");
            }
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .await?;

        tracing::info!("Telemetry server stopped");
        Ok(())
    }
}
