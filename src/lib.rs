//! Livestock telemetry ingestion with per-farm live fan-out
//!
//! Devices fitted to animals report GPS samples over HTTP. Each accepted
//! sample is persisted, pushed to every live viewer of the owning farm and
//! checked against the animal's assigned zone in the background.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use telemetry_hub::{InMemoryStore, ServerConfig, TelemetryServer};
//!
//! # async fn run() -> telemetry_hub::Result<()> {
//! let config = ServerConfig::from_env()?;
//! let server = TelemetryServer::with_store(config, Arc::new(InMemoryStore::new()));
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await
//! # }
//! ```

pub mod error;
pub mod hub;
pub mod ingest;
pub mod server;
pub mod stats;
pub mod store;
pub mod zone;

pub use error::{Error, Result};
pub use hub::{EntityId, Event, FanoutHub, HubConfig, HubError, TenantId, ViewerConnection};
pub use ingest::{IngestError, IngestReceipt, IngestRequest, IngestionPipeline};
pub use server::{ServerConfig, TelemetryServer};
pub use stats::HubStats;
pub use store::InMemoryStore;
pub use zone::{CheckOutcome, GeoPoint, Polygon, ZoneViolationChecker};
