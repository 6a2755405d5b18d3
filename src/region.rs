//! Circular search buffer around a query point.
//!
//! The circle is approximated by a regular polygon whose vertices are placed
//! with a local equirectangular conversion from metres to degrees. The
//! approximation holds for radii of tens to low hundreds of metres.

use geo::{Coord, LineString, Polygon};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::Coordinate;

/// Metres per degree of latitude (and of longitude at the equator)
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Default number of polygon vertices, closing vertex excluded
pub const DEFAULT_VERTICES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RegionError {
    #[error("radius must be a positive number of meters, got {0}")]
    Radius(f64),
    #[error("a search region needs at least 3 vertices, got {0}")]
    Vertices(usize),
    #[error("latitude {0} is too close to a pole to build a search region")]
    Polar(f64),
}

/// Closed polygon approximating a circle around a coordinate
#[derive(Debug, Clone)]
pub struct SearchRegion {
    center: Coordinate,
    radius_meters: f64,
    polygon: Polygon<f64>,
}

impl SearchRegion {
    /// Build a circle of `radius_meters` around `center` with `vertices` corners
    pub fn circle(
        center: Coordinate,
        radius_meters: f64,
        vertices: usize,
    ) -> Result<Self, RegionError> {
        if !radius_meters.is_finite() || radius_meters <= 0.0 {
            return Err(RegionError::Radius(radius_meters));
        }
        if vertices < 3 {
            return Err(RegionError::Vertices(vertices));
        }

        let cos_lat = center.lat.to_radians().cos();
        if cos_lat < 1e-6 {
            return Err(RegionError::Polar(center.lat));
        }

        let dlat = radius_meters / METERS_PER_DEGREE;
        let dlon = radius_meters / (METERS_PER_DEGREE * cos_lat);

        let mut ring: Vec<Coord<f64>> = (0..vertices)
            .map(|i| {
                let angle = 2.0 * std::f64::consts::PI * i as f64 / vertices as f64;
                Coord {
                    x: center.lon + dlon * angle.cos(),
                    y: center.lat + dlat * angle.sin(),
                }
            })
            .collect();
        ring.push(ring[0]);

        Ok(Self {
            center,
            radius_meters,
            polygon: Polygon::new(LineString::new(ring), vec![]),
        })
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// Exterior ring, closing vertex included
    pub fn ring(&self) -> &LineString<f64> {
        self.polygon.exterior()
    }

    /// Number of distinct vertices (closing vertex excluded)
    pub fn vertex_count(&self) -> usize {
        self.ring().0.len().saturating_sub(1)
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// GeoJSON geometry: `{"type": "Polygon", "coordinates": [[[lon, lat], ...]]}`
    pub fn to_geojson(&self) -> Value {
        let ring: Vec<[f64; 2]> = self.ring().0.iter().map(|c| [c.x, c.y]).collect();
        json!({
            "type": "Polygon",
            "coordinates": [ring],
        })
    }
}
