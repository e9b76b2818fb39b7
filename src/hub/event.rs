//! Event types routed through the hub
//!
//! Every event carries the tenant (farm) it belongs to. The hub uses that
//! tenant as the only routing key; an event is never delivered to viewers of
//! another tenant.
//!
//! # Wire format
//!
//! One JSON object per frame:
//!
//! ```text
//! {"type":"position-update","farm_id":"F1","animal_id":"A1",
//!  "payload":{"animal_id":"A1","lat":-20.0,"lng":-54.0,"speed_kmh":3.5,
//!             "battery":87,"timestamp":"2024-05-01T12:00:00Z"}}
//! {"type":"alert","farm_id":"F1","animal_id":"A1",
//!  "payload":{"kind":"out_of_zone","message":"..."}}
//! ```

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a tenant (farm)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a tracked entity (an animal)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload of a `position-update` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPayload {
    pub animal_id: EntityId,
    pub lat: f64,
    pub lng: f64,
    pub speed_kmh: f64,
    pub battery: u8,
    /// Serialized as an RFC 3339 string
    pub timestamp: DateTime<Utc>,
}

/// Payload of an `alert` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub kind: String,
    pub message: String,
}

/// An event published to the viewers of one tenant
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A freshly persisted position sample
    PositionUpdate {
        tenant: TenantId,
        entity: EntityId,
        payload: PositionPayload,
    },
    /// A detected violation or other notable condition
    Alert {
        tenant: TenantId,
        entity: Option<EntityId>,
        payload: AlertPayload,
    },
}

#[derive(Serialize)]
struct WireFrame<'a> {
    #[serde(rename = "type")]
    event_type: &'static str,
    farm_id: &'a TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    animal_id: Option<&'a EntityId>,
    payload: WirePayload<'a>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum WirePayload<'a> {
    Position(&'a PositionPayload),
    Alert(&'a AlertPayload),
}

impl Event {
    /// Create a position-update event
    pub fn position_update(tenant: TenantId, payload: PositionPayload) -> Self {
        Self::PositionUpdate {
            tenant,
            entity: payload.animal_id.clone(),
            payload,
        }
    }

    /// Create an alert event
    pub fn alert(
        tenant: TenantId,
        entity: Option<EntityId>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Alert {
            tenant,
            entity,
            payload: AlertPayload {
                kind: kind.into(),
                message: message.into(),
            },
        }
    }

    /// Tenant used to route this event
    pub fn tenant(&self) -> &TenantId {
        match self {
            Event::PositionUpdate { tenant, .. } | Event::Alert { tenant, .. } => tenant,
        }
    }

    /// Entity this event refers to, if any
    pub fn entity(&self) -> Option<&EntityId> {
        match self {
            Event::PositionUpdate { entity, .. } => Some(entity),
            Event::Alert { entity, .. } => entity.as_ref(),
        }
    }

    /// Value of the `type` field on the wire
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::PositionUpdate { .. } => "position-update",
            Event::Alert { .. } => "alert",
        }
    }

    /// Serialize into a single outbound frame
    pub fn to_frame(&self) -> serde_json::Result<Bytes> {
        let payload = match self {
            Event::PositionUpdate { payload, .. } => WirePayload::Position(payload),
            Event::Alert { payload, .. } => WirePayload::Alert(payload),
        };
        let frame = WireFrame {
            event_type: self.event_type(),
            farm_id: self.tenant(),
            animal_id: self.entity(),
            payload,
        };
        serde_json::to_vec(&frame).map(Bytes::from)
    }
}
