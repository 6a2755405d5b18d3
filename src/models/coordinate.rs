//! WGS84 coordinate pair.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A coordinate outside the WGS84 range.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordinateError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// Geographic point in decimal degrees (lat/lon)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    /// Create a coordinate, rejecting NaN and out-of-range values
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoordinateError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::Latitude(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(CoordinateError::Longitude(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Squared Euclidean distance in degree space.
    ///
    /// Latitude and longitude degrees are mixed without projection, so this
    /// only ranks candidates correctly inside a small neighbourhood (tens of
    /// metres), which is all the resolver ever compares.
    pub fn degree_distance_sq(&self, other: &Coordinate) -> f64 {
        let dx = other.lon - self.lon;
        let dy = other.lat - self.lat;
        dx * dx + dy * dy
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lon)
    }
}
