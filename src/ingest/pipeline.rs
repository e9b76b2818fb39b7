//! Ingestion pipeline
//!
//! Flow for one device report:
//! 1. Resolve the credential; unknown or inactive devices are rejected
//! 2. Reject devices not fitted to an entity
//! 3. Validate the sample
//! 4. Persist the sample and the entity's last known position
//! 5. Update device metadata (best effort)
//! 6. Publish a position-update to the tenant's viewers
//! 7. Dispatch the zone check on a detached task
//!
//! Nothing is published unless step 4 succeeded, so every position-update a
//! viewer sees corresponds to a persisted sample.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::instrument;

use super::error::IngestError;
use super::sample::{IngestRequest, PositionSample};
use crate::hub::{EntityId, FanoutHub, TenantId};
use crate::store::{DeviceCredential, DeviceDirectory, DeviceId, DeviceMetadata, EntityStateStore};
use crate::zone::{GeoPoint, ZoneViolationChecker};

/// Acknowledgement returned for an accepted sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub device_id: DeviceId,
    pub entity_id: EntityId,
    pub tenant_id: TenantId,
    pub recorded_at: DateTime<Utc>,
}

pub struct IngestionPipeline {
    directory: Arc<dyn DeviceDirectory>,
    state: Arc<dyn EntityStateStore>,
    hub: FanoutHub,
    checker: Arc<ZoneViolationChecker>,
}

impl IngestionPipeline {
    pub fn new(
        directory: Arc<dyn DeviceDirectory>,
        state: Arc<dyn EntityStateStore>,
        hub: FanoutHub,
        checker: Arc<ZoneViolationChecker>,
    ) -> Self {
        Self {
            directory,
            state,
            hub,
            checker,
        }
    }

    /// Accept one report from the device holding `credential`
    ///
    /// Returns once the sample is persisted and its position-update queued
    /// for fan-out. The zone check continues in the background.
    #[instrument(skip_all, fields(device, tenant))]
    pub async fn ingest(
        &self,
        credential: &DeviceCredential,
        request: IngestRequest,
    ) -> Result<IngestReceipt, IngestError> {
        let received_at = Utc::now();

        let device = match self.directory.find_by_credential(credential).await {
            Ok(Some(device)) if device.is_active => device,
            Ok(Some(device)) => {
                tracing::warn!(device = %device.device_id, "Rejected sample from inactive device");
                return Err(IngestError::Unauthenticated);
            }
            Ok(None) => {
                tracing::debug!("Rejected sample with unknown credential");
                return Err(IngestError::Unauthenticated);
            }
            Err(e) => {
                tracing::error!(error = %e, "Device directory lookup failed");
                return Err(IngestError::StorageFailure(e));
            }
        };

        let span = tracing::Span::current();
        span.record("device", tracing::field::display(&device.device_id));
        span.record("tenant", tracing::field::display(&device.tenant_id));

        let Some(entity_id) = device.entity_id.clone() else {
            tracing::debug!("Rejected sample from unassigned device");
            return Err(IngestError::Unroutable(device.device_id));
        };

        request.validate().map_err(IngestError::InvalidSample)?;

        let sample = PositionSample {
            device_id: device.device_id.clone(),
            entity_id,
            tenant_id: device.tenant_id.clone(),
            point: GeoPoint::new(request.lat, request.lng),
            speed_kmh: request.speed_kmh,
            battery: request.battery,
            recorded_at: request.timestamp.unwrap_or(received_at),
        };

        self.persist(&sample).await?;

        let metadata = DeviceMetadata {
            battery: sample.battery,
            last_contact_at: received_at,
        };
        if let Err(e) = self
            .state
            .update_device_metadata(&sample.device_id, metadata)
            .await
        {
            tracing::warn!(error = %e, "Device metadata update failed");
        }

        if let Err(e) = self.hub.broadcast(sample.position_event()).await {
            tracing::warn!(error = %e, "Position update not published");
        }

        // Detached: the receipt never waits on the zone check.
        drop(self.checker.dispatch(
            sample.entity_id.clone(),
            sample.tenant_id.clone(),
            sample.point,
        ));

        tracing::debug!(
            entity = %sample.entity_id,
            lat = sample.point.lat,
            lng = sample.point.lng,
            "Sample accepted"
        );

        Ok(IngestReceipt {
            device_id: sample.device_id,
            entity_id: sample.entity_id,
            tenant_id: sample.tenant_id,
            recorded_at: sample.recorded_at,
        })
    }

    async fn persist(&self, sample: &PositionSample) -> Result<(), IngestError> {
        if let Err(e) = self.state.append_sample(sample).await {
            tracing::error!(error = %e, "Failed to persist sample");
            return Err(IngestError::StorageFailure(e));
        }
        if let Err(e) = self
            .state
            .update_last_position(&sample.entity_id, sample.point, sample.recorded_at)
            .await
        {
            tracing::error!(error = %e, "Failed to update last known position");
            return Err(IngestError::StorageFailure(e));
        }
        Ok(())
    }
}
