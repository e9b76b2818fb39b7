//! Geofence containment and violation checking

pub mod checker;
pub mod geometry;

pub use checker::{CheckOutcome, ZoneViolationChecker};
pub use geometry::{GeoPoint, GeometryError, Polygon};
