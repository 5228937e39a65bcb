//! Nearest-within-radius capability used for local validator selection.

use crate::domain::models::{GeoPoint, Validator};

/// Spatial lookup over validator home points.
///
/// Implementations return the validators whose home point lies within
/// `radius_km` of `origin`, nearest first. Validators without a home point are
/// never returned.
pub trait ProximitySearch: Send + Sync {
    fn nearest_within_radius(&self, origin: GeoPoint, radius_km: f64, candidates: Vec<Validator>) -> Vec<Validator>;
}
