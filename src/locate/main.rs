//! Command-line reverse geocoding.
//!
//! Resolves either an explicit coordinate or a location message as sent by
//! the page, and prints the same report the server renders.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use geoloc::location::{acquire, parse_payload, FixedLocation, LocationMessage, LocationReading};
use geoloc::report::render_report;
use geoloc::{Config, Coordinate};

#[derive(Parser, Debug)]
#[command(name = "locate")]
#[command(about = "Find the nearest postal address for a GPS position")]
#[command(group(ArgGroup::new("input").required(true).args(["lat", "payload"])))]
struct Args {
    /// Latitude in decimal degrees
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude in decimal degrees
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Location message as JSON, or "-" to read it from stdin
    #[arg(long)]
    payload: Option<String>,

    /// Search radius in metres (overrides config)
    #[arg(short, long)]
    radius: Option<f64>,

    /// Data layer, repeatable, in priority order (overrides config)
    #[arg(long = "layer")]
    layers: Vec<String>,

    /// TOML configuration file
    #[arg(short, long, env = "GEOLOC_CONFIG")]
    config: Option<PathBuf>,

    /// Print the result and diagnostic as JSON instead of text
    #[arg(long)]
    json: bool,
}

impl Args {
    fn message(&self) -> Result<LocationMessage> {
        if let (Some(lat), Some(lon)) = (self.lat, self.lon) {
            let point = Coordinate::new(lat, lon)?;
            return Ok(LocationMessage::Reading(LocationReading::new(point, None)));
        }

        let raw = match self.payload.as_deref() {
            Some("-") => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read payload from stdin")?;
                buf
            }
            Some(text) => text.to_string(),
            None => anyhow::bail!("either --lat/--lon or --payload is required"),
        };

        Ok(parse_payload(&raw)?)
    }

    fn apply_overrides(&self, config: &mut Config) {
        if let Some(radius) = self.radius {
            config.radius_meters = radius;
        }
        if !self.layers.is_empty() {
            config.layers = self.layers.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref())?;
    args.apply_overrides(&mut config);
    config.validate().context("Invalid options")?;

    let message = args.message().context("Unusable location input")?;
    let reading = acquire(
        &FixedLocation::from(message),
        config.location_timeout(),
        config.fallback_coordinate(),
    )
    .await
    .map_err(|failure| anyhow::anyhow!("Location unavailable: {}", failure))?;
    let point = reading.coordinate()?;

    info!("Resolving {} within {} m", point, config.radius_meters);
    let resolver = config
        .resolver()
        .context("Failed to set up the geocoding client")?;
    let resolution = resolver
        .resolve(point, config.radius_meters, &config.layers)
        .await;

    if args.json {
        let out = json!({
            "reading": reading,
            "result": resolution.result,
            "diagnostic": resolution.diagnostic,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", render_report(&reading, &resolution));
    }

    Ok(())
}
