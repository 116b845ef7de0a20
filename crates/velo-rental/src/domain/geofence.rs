//! Great-circle distance and the return-location geofence

use crate::domain::types::Coordinates;
use crate::error::{RentalError, Result};

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Maximum distance between where a rental starts and where it may end
pub const DEFAULT_GEOFENCE_RADIUS_KM: f64 = 5.0;

/// Haversine distance between two points, in kilometres.
///
/// Symmetric in its arguments and exactly zero for identical points.
pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let half_dlat = (to.latitude - from.latitude).abs().to_radians() / 2.0;
    let half_dlon = (to.longitude - from.longitude).abs().to_radians() / 2.0;

    let a = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlon.sin().powi(2);

    2.0 * EARTH_RADIUS_KM * a.clamp(0.0, 1.0).sqrt().asin()
}

/// `true` when `to` lies within `radius_km` of `from` (inclusive).
pub fn is_within_radius(from: Coordinates, to: Coordinates, radius_km: f64) -> bool {
    distance_km(from, to) <= radius_km
}

/// Return-location policy applied when a rental ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    radius_km: f64,
}

impl Default for Geofence {
    fn default() -> Self {
        Self::new(DEFAULT_GEOFENCE_RADIUS_KM)
    }
}

impl Geofence {
    pub fn new(radius_km: f64) -> Self {
        Self { radius_km }
    }

    pub fn permits(&self, distance_km: f64) -> bool {
        distance_km <= self.radius_km
    }

    /// Check an end location against the start, returning the distance.
    pub fn check(&self, start: Coordinates, end: Coordinates) -> Result<f64> {
        let distance = distance_km(start, end);
        if !self.permits(distance) {
            return Err(RentalError::EndLocationTooFar {
                distance_km: distance,
                max_km: self.radius_km,
            });
        }
        Ok(distance)
    }
}
