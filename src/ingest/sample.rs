//! Ingestion request and position sample types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hub::{EntityId, Event, PositionPayload, TenantId};
use crate::store::DeviceId;
use crate::zone::GeoPoint;

/// Body of a device's GPS report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    /// Battery charge in percent
    pub battery: u8,
    /// Time of the fix; receipt time is used when absent
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl IngestRequest {
    /// Check value ranges, returning a description of the first problem
    pub fn validate(&self) -> Result<(), String> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(format!("lat out of range: {}", self.lat));
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(format!("lng out of range: {}", self.lng));
        }
        if !self.speed_kmh.is_finite() || self.speed_kmh < 0.0 {
            return Err(format!("speed_kmh must be >= 0: {}", self.speed_kmh));
        }
        if self.battery > 100 {
            return Err(format!("battery must be a percentage: {}", self.battery));
        }
        Ok(())
    }
}

/// One accepted telemetry reading, routed to an entity and tenant
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    pub device_id: DeviceId,
    pub entity_id: EntityId,
    pub tenant_id: TenantId,
    pub point: GeoPoint,
    pub speed_kmh: f64,
    pub battery: u8,
    pub recorded_at: DateTime<Utc>,
}

impl PositionSample {
    /// Position-update event announcing this sample
    pub fn position_event(&self) -> Event {
        Event::position_update(
            self.tenant_id.clone(),
            PositionPayload {
                animal_id: self.entity_id.clone(),
                lat: self.point.lat,
                lng: self.point.lng,
                speed_kmh: self.speed_kmh,
                battery: self.battery,
                timestamp: self.recorded_at,
            },
        )
    }
}
