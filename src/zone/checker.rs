//! Asynchronous geofence violation checks
//!
//! Each accepted sample triggers one check on a detached task. A check that
//! cannot be evaluated (lookup failure, malformed polygon) is skipped without
//! an alert: a missed check is preferred over a false alert.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::instrument;

use super::geometry::GeoPoint;
use crate::hub::{EntityId, Event, FanoutHub, TenantId};
use crate::store::{AlertLog, AlertRecord, GeofenceLookup};

/// Result of a single check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The entity has no assigned zone
    NoGeofence,
    /// The point is inside the assigned zone
    Inside,
    /// The point is outside; an alert was raised
    Violation,
    /// Lookup or containment evaluation failed
    Skipped,
}

pub struct ZoneViolationChecker {
    geofences: Arc<dyn GeofenceLookup>,
    alerts: Arc<dyn AlertLog>,
    hub: FanoutHub,
}

impl ZoneViolationChecker {
    pub fn new(
        geofences: Arc<dyn GeofenceLookup>,
        alerts: Arc<dyn AlertLog>,
        hub: FanoutHub,
    ) -> Self {
        Self {
            geofences,
            alerts,
            hub,
        }
    }

    /// Run a check on its own task
    ///
    /// The task owns its copies of the ids and point, so it outlives the
    /// request that dispatched it.
    pub fn dispatch(
        self: &Arc<Self>,
        entity: EntityId,
        tenant: TenantId,
        point: GeoPoint,
    ) -> JoinHandle<CheckOutcome> {
        let checker = Arc::clone(self);
        tokio::spawn(async move { checker.check(entity, tenant, point).await })
    }

    /// Evaluate `point` against the entity's assigned zone
    ///
    /// On violation, appends an `out_of_zone` alert record and publishes an
    /// `alert` event to the tenant's viewers.
    #[instrument(skip_all, fields(tenant = %tenant, entity = %entity))]
    pub async fn check(&self, entity: EntityId, tenant: TenantId, point: GeoPoint) -> CheckOutcome {
        let geofence = match self.geofences.assigned_geofence(&tenant, &entity).await {
            Ok(Some(geofence)) => geofence,
            Ok(None) => return CheckOutcome::NoGeofence,
            Err(e) => {
                tracing::debug!(error = %e, "Geofence lookup failed, check skipped");
                return CheckOutcome::Skipped;
            }
        };

        let inside = match geofence.polygon.contains(point) {
            Ok(inside) => inside,
            Err(e) => {
                tracing::debug!(zone = %geofence.zone_id, error = %e, "Malformed zone geometry, check skipped");
                return CheckOutcome::Skipped;
            }
        };
        if inside {
            return CheckOutcome::Inside;
        }

        let record = AlertRecord::out_of_zone(tenant.clone(), entity.clone(), Utc::now());
        let event = Event::alert(
            tenant,
            Some(entity),
            record.kind.as_str(),
            record.message.clone(),
        );

        tracing::info!(
            zone = %geofence.zone_id,
            lat = point.lat,
            lng = point.lng,
            "Entity outside assigned zone"
        );

        if let Err(e) = self.alerts.append(record).await {
            tracing::warn!(error = %e, "Failed to append alert record");
        }
        if let Err(e) = self.hub.broadcast(event).await {
            tracing::warn!(error = %e, "Failed to publish alert");
        }

        CheckOutcome::Violation
    }
}
