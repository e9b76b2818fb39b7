//! Collaborator interfaces for persistence and lookup
//!
//! The ingestion pipeline and zone checker depend only on these traits.
//! Durable backends implement them; [`memory::InMemoryStore`] implements all
//! of them for tests and local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hub::{EntityId, TenantId};
use crate::ingest::PositionSample;
use crate::zone::{GeoPoint, Polygon};

pub mod memory;

pub use memory::InMemoryStore;

/// Identifier of a physical tracking device
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque device credential (API key) presented on ingestion
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DeviceCredential(String);

impl DeviceCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for DeviceCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DeviceCredential(***)")
    }
}

/// Device directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub tenant_id: TenantId,
    /// Entity the device is currently fitted to, if any
    pub entity_id: Option<EntityId>,
    pub is_active: bool,
}

/// Best-effort device health written after each accepted sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMetadata {
    pub battery: u8,
    pub last_contact_at: DateTime<Utc>,
}

/// Last known state of a tracked entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub last_position: GeoPoint,
    pub last_seen_at: DateTime<Utc>,
}

/// A zone polygon assigned to an entity
#[derive(Debug, Clone, PartialEq)]
pub struct Geofence {
    pub zone_id: String,
    pub name: String,
    pub polygon: Polygon,
}

/// Kind of alert raised against an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    OutOfZone,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::OutOfZone => "out_of_zone",
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
}

/// Durable alert log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRecord {
    pub tenant_id: TenantId,
    pub entity_id: EntityId,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    /// Alert for an entity found outside its assigned zone
    pub fn out_of_zone(tenant_id: TenantId, entity_id: EntityId, created_at: DateTime<Utc>) -> Self {
        let message = format!("Animal {entity_id} left its assigned zone");
        Self {
            tenant_id,
            entity_id,
            kind: AlertKind::OutOfZone,
            severity: Severity::Warning,
            message,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Resolves device credentials
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Look up the device holding `credential`, active or not
    async fn find_by_credential(
        &self,
        credential: &DeviceCredential,
    ) -> StoreResult<Option<DeviceRecord>>;
}

/// Track history and last-known entity/device state
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EntityStateStore: Send + Sync {
    /// Append a sample to the entity's track history
    async fn append_sample(&self, sample: &PositionSample) -> StoreResult<()>;

    /// Overwrite the entity's last known position and time
    async fn update_last_position(
        &self,
        entity: &EntityId,
        position: GeoPoint,
        seen_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Record battery level and last contact time for a device
    async fn update_device_metadata(
        &self,
        device: &DeviceId,
        metadata: DeviceMetadata,
    ) -> StoreResult<()>;
}

/// Resolves an entity's assigned zone
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeofenceLookup: Send + Sync {
    async fn assigned_geofence(
        &self,
        tenant: &TenantId,
        entity: &EntityId,
    ) -> StoreResult<Option<Geofence>>;
}

/// Durable, append-only alert log
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertLog: Send + Sync {
    async fn append(&self, record: AlertRecord) -> StoreResult<()>;
}
