//! Candidate feature sources.
//!
//! A source answers one request per (layer, region) with the raw HTTP
//! status and body. Interpreting that answer is left to the resolver so
//! every failure can be turned into a diagnostic.

mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{AddressFeature, Coordinate};
use crate::region::SearchRegion;

pub use http::{HttpFeatureSource, SourceError, DEFAULT_ENDPOINT};

/// Transport-level failure of a single request
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

/// Raw upstream answer
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub status: u16,
    pub body: String,
}

impl FetchOutcome {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Something that can be asked for address candidates inside a region
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn fetch(
        &self,
        layer: &str,
        region: &SearchRegion,
        limit: usize,
    ) -> Result<FetchOutcome, FetchError>;
}

/// Features decoded from a response body
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    /// Number of entries in the upstream `features` array
    pub total: usize,
    /// Entries carrying a usable point geometry, in response order
    pub features: Vec<AddressFeature>,
}

/// Decode a GeoJSON-like `{"features": [...]}` body.
///
/// A missing `features` member counts as an empty list. Entries whose
/// geometry is not a valid `[lon, lat]` pair are dropped.
pub fn parse_features(body: &str) -> Result<FeatureCollection, serde_json::Error> {
    let data: Value = serde_json::from_str(body)?;
    let raw = data["features"].as_array().map(Vec::as_slice).unwrap_or(&[]);

    let features = raw.iter().filter_map(parse_feature).collect();

    Ok(FeatureCollection {
        total: raw.len(),
        features,
    })
}

fn parse_feature(feature: &Value) -> Option<AddressFeature> {
    let coords = feature["geometry"]["coordinates"].as_array()?;
    let lon = coords.first()?.as_f64()?;
    let lat = coords.get(1)?.as_f64()?;
    let coordinate = Coordinate::new(lat, lon).ok()?;

    let properties = feature["properties"]
        .as_object()
        .cloned()
        .unwrap_or_default();

    Some(AddressFeature::new(coordinate, properties))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point_features() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "geometry": {"type": "Point", "coordinates": [2.3523, 48.8567]},
                 "properties": {"label": "Rue de Test"}},
                {"type": "Feature",
                 "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}}
            ]
        }"#;

        let parsed = parse_features(body).unwrap();
        assert_eq!(parsed.total, 2);
        assert_eq!(parsed.features.len(), 2);
        assert_eq!(parsed.features[0].coordinate.lon, 2.3523);
        assert_eq!(parsed.features[0].coordinate.lat, 48.8567);
        assert_eq!(parsed.features[0].property_str("label"), Some("Rue de Test"));
        assert!(parsed.features[1].properties.is_empty());
    }

    #[test]
    fn test_missing_features_is_empty() {
        let parsed = parse_features(r#"{"type": "FeatureCollection"}"#).unwrap();
        assert_eq!(parsed.total, 0);
        assert!(parsed.features.is_empty());
    }

    #[test]
    fn test_unusable_geometry_dropped() {
        let body = r#"{"features": [
            {"geometry": {"type": "Point", "coordinates": [2.35]}},
            {"geometry": null},
            {"geometry": {"type": "Point", "coordinates": ["2.35", "48.85"]}},
            {"geometry": {"type": "Point", "coordinates": [200.0, 48.85]}},
            {"geometry": {"type": "Point", "coordinates": [2.35, 48.85]}}
        ]}"#;

        let parsed = parse_features(body).unwrap();
        assert_eq!(parsed.total, 5);
        assert_eq!(parsed.features.len(), 1);
    }

    #[test]
    fn test_malformed_body() {
        assert!(parse_features("<html>502 Bad Gateway</html>").is_err());
    }

    #[test]
    fn test_outcome_success_range() {
        assert!(FetchOutcome::new(200, "").is_success());
        assert!(FetchOutcome::new(204, "").is_success());
        assert!(!FetchOutcome::new(301, "").is_success());
        assert!(!FetchOutcome::new(500, "").is_success());
    }
}
