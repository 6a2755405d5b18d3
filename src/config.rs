//! Deployment configuration.
//!
//! Every field has a default, so an empty TOML file (or no file at all)
//! gives a working setup against the IGN BAN layers.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::label::{default_rules, LabelRule};
use crate::location::DEFAULT_FALLBACK;
use crate::models::Coordinate;
use crate::region::DEFAULT_VERTICES;
use crate::resolver::{Resolver, DEFAULT_LIMIT};
use crate::source::{HttpFeatureSource, SourceError, DEFAULT_ENDPOINT};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("endpoint '{0}' is not a valid URL")]
    Endpoint(String),
    #[error("at least one data layer must be configured")]
    NoLayers,
    #[error("radius_meters must be positive, got {0}")]
    Radius(f64),
    #[error("vertices must be at least 3, got {0}")]
    Vertices(usize),
    #[error("limit must be at least 1")]
    Limit,
    #[error("fallback coordinate is invalid: {0}")]
    Fallback(String),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Geocoding endpoint
    pub endpoint: String,
    /// Data layers in priority order
    pub layers: Vec<String>,
    pub radius_meters: f64,
    /// Polygon vertices of the search region
    pub vertices: usize,
    /// Result cap per request
    pub limit: usize,
    /// Per-request timeout for the geocoding API
    pub timeout_secs: u64,
    /// Time allowed for a location reading
    pub location_timeout_secs: u64,
    /// Language hint sent to the API
    pub language: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Honour HTTP(S)_PROXY settings for geocoding requests
    pub use_proxy: bool,
    /// Substitute `fallback` when the sensor fails
    pub fallback_enabled: bool,
    pub fallback: Coordinate,
    pub label_rules: Vec<LabelRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            layers: vec!["BAN.DATA.GOUV:ban".to_string(), "BAN:adresse".to_string()],
            radius_meters: 80.0,
            vertices: DEFAULT_VERTICES,
            limit: DEFAULT_LIMIT,
            timeout_secs: 12,
            location_timeout_secs: 15,
            language: None,
            api_key_env: None,
            use_proxy: true,
            fallback_enabled: true,
            fallback: DEFAULT_FALLBACK,
            label_rules: default_rules(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Load `path` when given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.endpoint).map_err(|_| ConfigError::Endpoint(self.endpoint.clone()))?;
        if self.layers.is_empty() {
            return Err(ConfigError::NoLayers);
        }
        if !(self.radius_meters.is_finite() && self.radius_meters > 0.0) {
            return Err(ConfigError::Radius(self.radius_meters));
        }
        if self.vertices < 3 {
            return Err(ConfigError::Vertices(self.vertices));
        }
        if self.limit == 0 {
            return Err(ConfigError::Limit);
        }
        Coordinate::new(self.fallback.lat, self.fallback.lon)
            .map_err(|e| ConfigError::Fallback(e.to_string()))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn location_timeout(&self) -> Duration {
        Duration::from_secs(self.location_timeout_secs)
    }

    pub fn fallback_coordinate(&self) -> Option<Coordinate> {
        self.fallback_enabled.then_some(self.fallback)
    }

    /// API key from the configured environment variable.
    ///
    /// A missing variable is logged and treated as "no key".
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env.as_ref()?;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Some(key.trim().to_string()),
            _ => {
                warn!("API key variable {} is not set, querying without key", var);
                None
            }
        }
    }

    pub fn feature_source(&self) -> Result<HttpFeatureSource, SourceError> {
        let source = if self.use_proxy {
            HttpFeatureSource::new(&self.endpoint, self.timeout())?
        } else {
            HttpFeatureSource::direct(&self.endpoint, self.timeout())?
        };
        Ok(source
            .with_api_key(self.api_key())
            .with_language(self.language.clone()))
    }

    pub fn resolver(&self) -> Result<Resolver<HttpFeatureSource>, SourceError> {
        Ok(Resolver::new(self.feature_source()?)
            .with_vertices(self.vertices)
            .with_limit(self.limit)
            .with_label_rules(self.label_rules.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layers, vec!["BAN.DATA.GOUV:ban", "BAN:adresse"]);
        assert_eq!(config.timeout(), Duration::from_secs(12));
        assert_eq!(config.fallback_coordinate(), Some(DEFAULT_FALLBACK));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
endpoint = "https://maps.example.com/v1/reverse"
layers = ["addresses", "streets"]
radius_meters = 150.0
language = "fr"
api_key_env = "GEOLOC_TEST_UNSET_KEY"
fallback_enabled = false
label_rules = ["name", ["housenumber", "street"]]
"#
        )
        .unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.layers, vec!["addresses", "streets"]);
        assert_eq!(config.radius_meters, 150.0);
        assert_eq!(config.vertices, DEFAULT_VERTICES);
        assert_eq!(config.language.as_deref(), Some("fr"));
        assert_eq!(config.fallback_coordinate(), None);
        assert_eq!(config.label_rules.len(), 2);
        assert_eq!(config.api_key(), None);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "layers = []").unwrap();
        assert!(Config::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = Config::default();
        config.radius_meters = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::Radius(0.0)));

        let mut config = Config::default();
        config.endpoint = "apicarto".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Endpoint(_))));

        let mut config = Config::default();
        config.vertices = 2;
        assert_eq!(config.validate(), Err(ConfigError::Vertices(2)));

        let mut config = Config::default();
        config.limit = 0;
        assert_eq!(config.validate(), Err(ConfigError::Limit));

        let mut config = Config::default();
        config.fallback = Coordinate { lat: 120.0, lon: 0.0 };
        assert!(matches!(config.validate(), Err(ConfigError::Fallback(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(Config::load_from_file("/nonexistent/geoloc.toml").is_err());
    }
}
