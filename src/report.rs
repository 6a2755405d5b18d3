//! Plain-text rendering of readings and resolutions.

use std::fmt::Write as _;

use crate::location::LocationReading;
use crate::resolver::Resolution;

pub const NOT_FOUND_MESSAGE: &str = "No address found or API error.";
pub const RETRY_HINT: &str = "Try again outdoors, or enlarge the search buffer (e.g. 150 m).";
pub const FALLBACK_NOTICE: &str =
    "Location denied or unavailable: default coordinates are being used.";

/// Coordinates block: 6 decimals, accuracy rounded to whole metres
pub fn render_reading(reading: &LocationReading) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Coordinates");
    let _ = writeln!(out, "  Latitude : {:.6}", reading.lat);
    let _ = writeln!(out, "  Longitude: {:.6}", reading.lon);
    if let Some(accuracy) = reading.accuracy {
        let _ = writeln!(out, "  Accuracy : ±{} m", accuracy.round() as i64);
    }
    if reading.is_fallback() {
        let _ = writeln!(out, "{}", FALLBACK_NOTICE);
    }
    out
}

/// Address block, or the diagnostic when nothing was found
pub fn render_resolution(resolution: &Resolution) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Address");

    match resolution.result {
        Some(ref found) => {
            let _ = writeln!(out, "  {}", found.adresse);
            let _ = writeln!(out, "  Source: {}", found.layer);
            let _ = writeln!(out, "  Latitude: {:.6}", found.lat);
            let _ = writeln!(out, "  Longitude: {:.6}", found.lon);
            let _ = writeln!(
                out,
                "Position: {:.6},{:.6} | {}",
                found.lat, found.lon, found.adresse
            );
        }
        None => {
            let diag = serde_json::to_string_pretty(&resolution.diagnostic)
                .unwrap_or_else(|_| format!("{:?}", resolution.diagnostic));
            let _ = writeln!(out, "{}", NOT_FOUND_MESSAGE);
            let _ = writeln!(out, "Diagnostic:");
            let _ = writeln!(out, "{}", diag);
            let _ = writeln!(out, "{}", RETRY_HINT);
        }
    }
    out
}

/// Full report for one request
pub fn render_report(reading: &LocationReading, resolution: &Resolution) -> String {
    format!(
        "{}\n{}",
        render_reading(reading),
        render_resolution(resolution)
    )
}
