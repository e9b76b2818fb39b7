//! Device telemetry ingestion
//!
//! Authenticates a device report, persists it, publishes a position-update
//! to the owning tenant's viewers and hands the point to the zone checker.

pub mod error;
pub mod pipeline;
pub mod sample;

pub use error::IngestError;
pub use pipeline::{IngestReceipt, IngestionPipeline};
pub use sample::{IngestRequest, PositionSample};
