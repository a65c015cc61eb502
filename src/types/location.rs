use serde::{Deserialize, Serialize};

/// Represents a geographical coordinate using latitude and longitude.
///
/// Latitude is the first element (index 0), and longitude is the second (index 1).
///
/// # Examples
///
/// ```
/// use aqi_forecast::LatLon;
///
/// let karachi = LatLon(24.8607, 67.0011);
/// assert_eq!(karachi.0, 24.8607); // Latitude
/// assert_eq!(karachi.1, 67.0011); // Longitude
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);

impl LatLon {
    pub const KARACHI: LatLon = LatLon(24.8607, 67.0011);
}

impl Default for LatLon {
    fn default() -> Self {
        LatLon::KARACHI
    }
}
