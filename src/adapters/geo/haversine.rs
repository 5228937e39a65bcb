//! In-process great-circle proximity search.
//!
//! Scans candidate home points with the haversine formula. Good enough for
//! registry sizes SQLite serves; a spatial index can replace it behind
//! [`ProximitySearch`] without touching assignment.

use crate::domain::models::{GeoPoint, Validator};
use crate::domain::ports::ProximitySearch;

const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineProximity;

impl ProximitySearch for HaversineProximity {
    fn nearest_within_radius(&self, origin: GeoPoint, radius_km: f64, candidates: Vec<Validator>) -> Vec<Validator> {
        let mut within: Vec<(f64, Validator)> = candidates
            .into_iter()
            .filter_map(|v| {
                let distance = haversine_km(origin, v.home_point?);
                (distance <= radius_km).then_some((distance, v))
            })
            .collect();

        within.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        within.into_iter().map(|(_, v)| v).collect()
    }
}
