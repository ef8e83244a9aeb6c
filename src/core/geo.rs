use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate with latitude and longitude
///
/// Serialized as `{"lat": .., "lng": ..}`, the shape Leaflet accepts for
/// `L.latLng`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    /// Creates a new LatLng coordinate
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl Default for LatLng {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}
