//! Location acquisition.
//!
//! A reading comes from a one-shot asynchronous source (typically the
//! browser geolocation call, relayed as a JSON message). Sensor failures
//! are ordinary values; a caller may map them to a fixed fallback
//! coordinate, in which case the reading is flagged with
//! `note = "fallback"`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Coordinate, CoordinateError};

pub const FALLBACK_NOTE: &str = "fallback";

/// Accuracy reported for fallback readings
pub const FALLBACK_ACCURACY: f64 = 999.0;

/// Default fallback position (Paris)
pub const DEFAULT_FALLBACK: Coordinate = Coordinate {
    lat: 48.8566,
    lon: 2.3522,
};

/// One position reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReading {
    pub lat: f64,
    pub lon: f64,
    /// Accuracy radius in metres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LocationReading {
    pub fn new(coordinate: Coordinate, accuracy: Option<f64>) -> Self {
        Self {
            lat: coordinate.lat,
            lon: coordinate.lon,
            accuracy,
            note: None,
        }
    }

    pub fn fallback(coordinate: Coordinate) -> Self {
        Self {
            lat: coordinate.lat,
            lon: coordinate.lon,
            accuracy: Some(FALLBACK_ACCURACY),
            note: Some(FALLBACK_NOTE.to_string()),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.note.as_deref() == Some(FALLBACK_NOTE)
    }

    pub fn coordinate(&self) -> Result<Coordinate, CoordinateError> {
        Coordinate::new(self.lat, self.lon)
    }
}

/// Why the sensor gave no position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorFailure {
    #[error("permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for a position")]
    Timeout,
    #[error("geolocation is not supported")]
    Unsupported,
}

impl SensorFailure {
    /// Map a browser `GeolocationPositionError.code`
    pub fn from_code(code: u64) -> Self {
        match code {
            1 => Self::PermissionDenied,
            3 => Self::Timeout,
            _ => Self::PositionUnavailable,
        }
    }

    /// Map a textual reason such as `"no_geolocation"`
    pub fn from_reason(reason: &str) -> Self {
        match reason.trim().to_ascii_lowercase().as_str() {
            "no_geolocation" | "unsupported" => Self::Unsupported,
            "permission_denied" | "denied" => Self::PermissionDenied,
            "timeout" => Self::Timeout,
            _ => Self::PositionUnavailable,
        }
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("malformed location payload: {0}")]
    Malformed(String),
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(#[from] CoordinateError),
}

/// Decoded browser message: a reading or a sensor failure
#[derive(Debug, Clone, PartialEq)]
pub enum LocationMessage {
    Reading(LocationReading),
    Failure(SensorFailure),
}

impl LocationMessage {
    /// Reading, or the fallback reading when the sensor failed and a fallback is given
    pub fn into_reading(
        self,
        fallback: Option<Coordinate>,
    ) -> Result<LocationReading, SensorFailure> {
        match (self, fallback) {
            (LocationMessage::Reading(r), _) => Ok(r),
            (LocationMessage::Failure(_), Some(c)) => Ok(LocationReading::fallback(c)),
            (LocationMessage::Failure(f), None) => Err(f),
        }
    }
}

/// Parse the JSON message sent by the page.
///
/// Accepts `{lat, lon, accuracy?, note?}` or `{error: "<reason>" | <code>}`.
pub fn parse_payload(text: &str) -> Result<LocationMessage, LocationError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| LocationError::Malformed(e.to_string()))?;

    let Some(obj) = value.as_object() else {
        return Err(LocationError::Malformed(format!(
            "expected a JSON object, got {}",
            value
        )));
    };

    if obj.contains_key("lat") && obj.contains_key("lon") {
        let reading: LocationReading = serde_json::from_value(value.clone())
            .map_err(|e| LocationError::Malformed(e.to_string()))?;
        reading.coordinate()?;
        return Ok(LocationMessage::Reading(reading));
    }

    match obj.get("error") {
        Some(Value::String(reason)) => Ok(LocationMessage::Failure(SensorFailure::from_reason(
            reason,
        ))),
        Some(Value::Number(code)) => Ok(LocationMessage::Failure(SensorFailure::from_code(
            code.as_u64().unwrap_or_default(),
        ))),
        _ => Err(LocationError::Malformed(
            "expected 'lat' and 'lon' or an 'error' field".to_string(),
        )),
    }
}

/// One-shot position provider
#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_position(&self) -> Result<LocationReading, SensorFailure>;
}

/// Source answering with a known message, e.g. one relayed by the page
#[derive(Debug, Clone)]
pub struct FixedLocation {
    answer: Result<LocationReading, SensorFailure>,
}

impl FixedLocation {
    pub fn new(reading: LocationReading) -> Self {
        Self { answer: Ok(reading) }
    }

    pub fn failing(failure: SensorFailure) -> Self {
        Self {
            answer: Err(failure),
        }
    }
}

impl From<LocationMessage> for FixedLocation {
    fn from(message: LocationMessage) -> Self {
        match message {
            LocationMessage::Reading(r) => Self::new(r),
            LocationMessage::Failure(f) => Self::failing(f),
        }
    }
}

#[async_trait]
impl LocationSource for FixedLocation {
    async fn current_position(&self) -> Result<LocationReading, SensorFailure> {
        self.answer.clone()
    }
}

/// Read a position, bounded by `timeout`.
///
/// Any failure (timeout included) becomes a fallback reading when
/// `fallback` is set.
pub async fn acquire<L>(
    source: &L,
    timeout: Duration,
    fallback: Option<Coordinate>,
) -> Result<LocationReading, SensorFailure>
where
    L: LocationSource + ?Sized,
{
    let outcome = match tokio::time::timeout(timeout, source.current_position()).await {
        Ok(outcome) => outcome,
        Err(_) => Err(SensorFailure::Timeout),
    };

    match outcome {
        Ok(reading) => {
            debug!("Position {},{} (±{:?} m)", reading.lat, reading.lon, reading.accuracy);
            Ok(reading)
        }
        Err(failure) => {
            warn!("Location unavailable: {}", failure);
            LocationMessage::Failure(failure).into_reading(fallback)
        }
    }
}
