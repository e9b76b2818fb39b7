//! Ingestion error types

use thiserror::Error;

use crate::store::{DeviceId, StoreError};

/// Failures surfaced to the ingesting device
///
/// Failures in best-effort side channels (device metadata, zone checks,
/// fan-out) are logged by the pipeline and never appear here.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Unknown or inactive device credential
    #[error("unknown or inactive device credential")]
    Unauthenticated,

    /// Device is not fitted to any entity
    #[error("device {0} has no assigned entity")]
    Unroutable(DeviceId),

    /// Sample values outside their valid ranges
    #[error("invalid sample: {0}")]
    InvalidSample(String),

    /// Directory lookup or sample persistence failed
    #[error("storage failure: {0}")]
    StorageFailure(#[source] StoreError),
}
