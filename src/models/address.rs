//! Address candidates, resolved addresses and attempt diagnostics.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Coordinate;

/// Upper bound on the upstream body excerpt kept in a diagnostic
pub const BODY_EXCERPT_CHARS: usize = 300;

/// One candidate returned by the geocoding API.
///
/// Properties are kept as a raw JSON object since upstream layers do not
/// share a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressFeature {
    pub coordinate: Coordinate,
    pub properties: Map<String, Value>,
}

impl AddressFeature {
    pub fn new(coordinate: Coordinate, properties: Map<String, Value>) -> Self {
        Self {
            coordinate,
            properties,
        }
    }

    /// String value of a property, if present and a string
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// The selected address for a query point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAddress {
    /// Human-readable address label
    pub adresse: String,
    pub lat: f64,
    pub lon: f64,
    /// Data layer the feature came from
    pub layer: String,
}

/// Troubleshooting data about the last layer attempt.
///
/// Returned next to the result and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layer: Option<String>,
    #[serde(rename = "http", skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(rename = "features", skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Diagnostic {
    pub fn for_layer(layer: &str) -> Self {
        Self {
            layer: Some(layer.to_string()),
            ..Default::default()
        }
    }

    pub fn failed(layer: Option<&str>, error: impl ToString) -> Self {
        Self {
            layer: layer.map(String::from),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    /// Keep the head of an upstream body
    pub fn set_body(&mut self, body: &str) {
        self.body = Some(body.chars().take(BODY_EXCERPT_CHARS).collect());
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
