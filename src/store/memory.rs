//! In-memory implementation of every collaborator trait.
//!
//! Maps are guarded by `tokio::sync::RwLock`. State is lost on restart; the
//! store exists for tests, demos and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    AlertLog, AlertRecord, DeviceCredential, DeviceDirectory, DeviceId, DeviceMetadata,
    DeviceRecord, EntityState, EntityStateStore, Geofence, GeofenceLookup, StoreResult,
};
use crate::hub::{EntityId, TenantId};
use crate::ingest::PositionSample;
use crate::zone::GeoPoint;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    devices: RwLock<HashMap<DeviceCredential, DeviceRecord>>,
    tracks: RwLock<HashMap<EntityId, Vec<PositionSample>>>,
    entities: RwLock<HashMap<EntityId, EntityState>>,
    device_metadata: RwLock<HashMap<DeviceId, DeviceMetadata>>,
    geofences: RwLock<HashMap<(TenantId, EntityId), Geofence>>,
    alerts: RwLock<Vec<AlertRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a device under `credential`
    pub async fn insert_device(&self, credential: DeviceCredential, record: DeviceRecord) {
        self.devices.write().await.insert(credential, record);
    }

    /// Assign (or replace) an entity's zone
    pub async fn assign_geofence(&self, tenant: TenantId, entity: EntityId, geofence: Geofence) {
        self.geofences.write().await.insert((tenant, entity), geofence);
    }

    /// Track history for an entity, oldest first
    pub async fn track(&self, entity: &EntityId) -> Vec<PositionSample> {
        self.tracks
            .read()
            .await
            .get(entity)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn entity_state(&self, entity: &EntityId) -> Option<EntityState> {
        self.entities.read().await.get(entity).cloned()
    }

    pub async fn device_metadata(&self, device: &DeviceId) -> Option<DeviceMetadata> {
        self.device_metadata.read().await.get(device).cloned()
    }

    /// Every alert appended so far, in append order
    pub async fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.read().await.clone()
    }
}

#[async_trait]
impl DeviceDirectory for InMemoryStore {
    async fn find_by_credential(
        &self,
        credential: &DeviceCredential,
    ) -> StoreResult<Option<DeviceRecord>> {
        Ok(self.devices.read().await.get(credential).cloned())
    }
}

#[async_trait]
impl EntityStateStore for InMemoryStore {
    async fn append_sample(&self, sample: &PositionSample) -> StoreResult<()> {
        self.tracks
            .write()
            .await
            .entry(sample.entity_id.clone())
            .or_default()
            .push(sample.clone());
        Ok(())
    }

    async fn update_last_position(
        &self,
        entity: &EntityId,
        position: GeoPoint,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.entities.write().await.insert(
            entity.clone(),
            EntityState {
                last_position: position,
                last_seen_at: seen_at,
            },
        );
        Ok(())
    }

    async fn update_device_metadata(
        &self,
        device: &DeviceId,
        metadata: DeviceMetadata,
    ) -> StoreResult<()> {
        self.device_metadata
            .write()
            .await
            .insert(device.clone(), metadata);
        Ok(())
    }
}

#[async_trait]
impl GeofenceLookup for InMemoryStore {
    async fn assigned_geofence(
        &self,
        tenant: &TenantId,
        entity: &EntityId,
    ) -> StoreResult<Option<Geofence>> {
        Ok(self
            .geofences
            .read()
            .await
            .get(&(tenant.clone(), entity.clone()))
            .cloned())
    }
}

#[async_trait]
impl AlertLog for InMemoryStore {
    async fn append(&self, record: AlertRecord) -> StoreResult<()> {
        self.alerts.write().await.push(record);
        Ok(())
    }
}
