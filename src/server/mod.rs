//! HTTP and WebSocket surface
//!
//! Routes:
//! - `POST /api/v1/iot/gps` device reports, credential in `X-Device-Key`
//! - `GET /ws?farm_id=<tenant>` live viewer stream
//! - `GET /health` liveness check

pub mod config;
pub mod ingest;
pub mod listener;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::hub::FanoutHub;
use crate::ingest::IngestionPipeline;

pub use config::{ConfigError, ServerConfig};
pub use listener::TelemetryServer;

/// State shared by every route
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
    pub hub: FanoutHub,
    /// Viewer sessions silent for this long are dropped
    pub viewer_idle_timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: Arc<IngestionPipeline>, hub: FanoutHub) -> Self {
        Self {
            pipeline,
            hub,
            viewer_idle_timeout: config::DEFAULT_VIEWER_IDLE_TIMEOUT,
        }
    }

    pub fn viewer_idle_timeout(mut self, timeout: Duration) -> Self {
        self.viewer_idle_timeout = timeout;
        self
    }
}

/// Build the router over `state`
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/api/v1/iot/gps", post(ingest::ingest_gps))
        .route("/ws", get(ws::serve_ws))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
