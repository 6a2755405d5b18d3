//! Reverse geocoding server.
//!
//! Receives the location message posted by the page and answers with the
//! nearest address, its diagnostic and a rendered report. A plain reverse
//! endpoint takes a point as query parameters.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geoloc::location::{acquire, parse_payload, FixedLocation, LocationReading};
use geoloc::models::{Coordinate, Diagnostic, ResolvedAddress};
use geoloc::report::render_report;
use geoloc::source::HttpFeatureSource;
use geoloc::{Config, Resolver};

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Reverse geocoding server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// TOML configuration file
    #[arg(short, long, env = "GEOLOC_CONFIG")]
    config: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    config: Config,
    resolver: Resolver<HttpFeatureSource>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Geoloc Server");
    let config = Config::load_or_default(args.config.as_deref())?;
    let resolver = config
        .resolver()
        .context("Failed to set up the geocoding client")?;
    info!(
        "Geocoding endpoint {} with layers {:?}",
        config.endpoint, config.layers
    );

    let state = Arc::new(AppState { config, resolver });

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/reverse", get(reverse_handler))
        .route("/v1/locate", post(locate_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Reverse geocoding for a point
async fn reverse_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReverseQueryParams>,
) -> Result<Json<ReverseResponse>, (StatusCode, String)> {
    let point = Coordinate::new(params.point_lat, params.point_lon)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let radius = params.radius.unwrap_or(state.config.radius_meters);
    let layers = parse_layers(&params.layers).unwrap_or_else(|| state.config.layers.clone());

    let (result, diagnostic) = state
        .resolver
        .resolve(point, radius, &layers)
        .await
        .into_parts();

    Ok(Json(ReverseResponse { result, diagnostic }))
}

/// Resolve the location message sent by the page
async fn locate_handler(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<LocateResponse>, (StatusCode, String)> {
    let message = parse_payload(&body).map_err(|e| {
        tracing::warn!("Rejected location payload: {}", e);
        (StatusCode::BAD_REQUEST, e.to_string())
    })?;

    let reading = acquire(
        &FixedLocation::from(message),
        state.config.location_timeout(),
        state.config.fallback_coordinate(),
    )
    .await
    .map_err(|failure| (StatusCode::UNPROCESSABLE_ENTITY, failure.to_string()))?;

    let point = reading
        .coordinate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let resolution = state
        .resolver
        .resolve(point, state.config.radius_meters, &state.config.layers)
        .await;
    let report = render_report(&reading, &resolution);
    let (result, diagnostic) = resolution.into_parts();

    Ok(Json(LocateResponse {
        reading,
        result,
        diagnostic,
        report,
    }))
}

#[derive(Deserialize)]
struct ReverseQueryParams {
    /// Point latitude
    #[serde(rename = "point.lat")]
    point_lat: f64,
    /// Point longitude
    #[serde(rename = "point.lon")]
    point_lon: f64,
    /// Search radius in metres
    radius: Option<f64>,
    /// Layers in priority order (comma-separated)
    layers: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ReverseResponse {
    result: Option<ResolvedAddress>,
    diagnostic: Diagnostic,
}

#[derive(Serialize, Deserialize)]
struct LocateResponse {
    reading: LocationReading,
    result: Option<ResolvedAddress>,
    diagnostic: Diagnostic,
    report: String,
}

/// Parse a comma-separated layer list, ignoring blanks
fn parse_layers(layers: &Option<String>) -> Option<Vec<String>> {
    let parsed: Vec<String> = layers
        .as_ref()?
        .split(',')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();
    (!parsed.is_empty()).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Upstream stand-in answering one feature for layer "b" only
    async fn spawn_upstream() -> String {
        async fn features(
            Query(params): Query<std::collections::HashMap<String, String>>,
        ) -> Json<serde_json::Value> {
            let features = if params.get("source").map(String::as_str) == Some("b") {
                json!([{
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [2.3523, 48.8567]},
                    "properties": {"label": "Rue de Test"}
                }])
            } else {
                json!([])
            };
            Json(json!({"type": "FeatureCollection", "features": features}))
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route("/wfs", get(features));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/wfs", addr)
    }

    async fn spawn_app(config: Config) -> String {
        let resolver = config.resolver().unwrap();
        let state = Arc::new(AppState { config, resolver });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn test_config(endpoint: String) -> Config {
        Config {
            endpoint,
            layers: vec!["a".to_string(), "b".to_string()],
            timeout_secs: 2,
            use_proxy: false,
            ..Config::default()
        }
    }

    #[test]
    fn test_parse_layers() {
        assert_eq!(
            parse_layers(&Some("a, b,,c".to_string())),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(parse_layers(&Some(" , ".to_string())), None);
        assert_eq!(parse_layers(&None), None);
    }

    #[tokio::test]
    async fn test_locate_endpoint() {
        let base = spawn_app(test_config(spawn_upstream().await)).await;

        let response = client()
            .post(format!("{}/v1/locate", base))
            .body(r#"{"lat": 48.8566, "lon": 2.3522, "accuracy": 15}"#)
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let body: LocateResponse = response.json().await.unwrap();
        let found = body.result.unwrap();
        assert_eq!(found.adresse, "Rue de Test");
        assert_eq!(found.layer, "b");
        assert_eq!(body.reading.accuracy, Some(15.0));
        assert!(body.report.contains("Position: 48.856700,2.352300 | Rue de Test"));
    }

    #[tokio::test]
    async fn test_locate_fallback_and_errors() {
        let upstream = spawn_upstream().await;
        let base = spawn_app(test_config(upstream.clone())).await;
        let client = client();

        let response = client
            .post(format!("{}/v1/locate", base))
            .body(r#"{"error": "no_geolocation"}"#)
            .send()
            .await
            .unwrap();
        let body: LocateResponse = response.json().await.unwrap();
        assert!(body.reading.is_fallback());
        assert!(body.result.is_some());

        let response = client
            .post(format!("{}/v1/locate", base))
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);

        let no_fallback = Config {
            fallback_enabled: false,
            ..test_config(upstream)
        };
        let base = spawn_app(no_fallback).await;
        let response = client
            .post(format!("{}/v1/locate", base))
            .body(r#"{"error": 1}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_reverse_endpoint() {
        let base = spawn_app(test_config(spawn_upstream().await)).await;
        let client = client();

        let body: ReverseResponse = client
            .get(format!(
                "{}/v1/reverse?point.lat=48.8566&point.lon=2.3522&layers=a",
                base
            ))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(body.result.is_none());
        assert_eq!(body.diagnostic.layer.as_deref(), Some("a"));
        assert_eq!(body.diagnostic.feature_count, Some(0));

        let response = client
            .get(format!("{}/v1/reverse?point.lat=123&point.lon=2.35", base))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }
}
