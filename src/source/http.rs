//! HTTP feature source for WFS-style address APIs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::{FeatureSource, FetchError, FetchOutcome};
use crate::region::SearchRegion;

/// IGN apicarto WFS proxy (BAN address layers)
pub const DEFAULT_ENDPOINT: &str = "https://apicarto.ign.fr/api/wfs/geoportail";

const USER_AGENT: &str = concat!("geoloc/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid endpoint URL '{url}': {source}")]
    Endpoint {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Queries a geocoding endpoint with a polygon filter.
///
/// Each request carries `source` (the layer), `geom` (GeoJSON polygon) and
/// `_limit`, plus `apikey` and `language` when configured.
#[derive(Debug, Clone)]
pub struct HttpFeatureSource {
    client: Client,
    endpoint: Url,
    timeout: Duration,
    api_key: Option<String>,
    language: Option<String>,
}

impl HttpFeatureSource {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SourceError> {
        Self::build(endpoint, timeout, true)
    }

    /// Like [`HttpFeatureSource::new`] but ignoring system proxy settings
    pub fn direct(endpoint: &str, timeout: Duration) -> Result<Self, SourceError> {
        Self::build(endpoint, timeout, false)
    }

    fn build(endpoint: &str, timeout: Duration, use_proxy: bool) -> Result<Self, SourceError> {
        let endpoint = Url::parse(endpoint).map_err(|source| SourceError::Endpoint {
            url: endpoint.to_string(),
            source,
        })?;

        let mut builder = Client::builder().user_agent(USER_AGENT).timeout(timeout);
        if !use_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            endpoint,
            timeout,
            api_key: None,
            language: None,
        })
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full request URL for a layer and region
    pub fn request_url(&self, layer: &str, region: &SearchRegion, limit: usize) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("source", layer)
                .append_pair("geom", &region.to_geojson().to_string())
                .append_pair("_limit", &limit.to_string());
            if let Some(ref key) = self.api_key {
                query.append_pair("apikey", key);
            }
            if let Some(ref lang) = self.language {
                query.append_pair("language", lang);
            }
        }
        url
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

#[async_trait]
impl FeatureSource for HttpFeatureSource {
    async fn fetch(
        &self,
        layer: &str,
        region: &SearchRegion,
        limit: usize,
    ) -> Result<FetchOutcome, FetchError> {
        let url = self.request_url(layer, region, limit);
        debug!("GET {} (layer {})", self.endpoint, layer);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.classify(e))?;

        Ok(FetchOutcome { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coordinate;
    use std::collections::HashMap;

    fn region() -> SearchRegion {
        let center = Coordinate::new(48.8566, 2.3522).unwrap();
        SearchRegion::circle(center, 80.0, 32).unwrap()
    }

    #[test]
    fn test_request_url_parameters() {
        let source = HttpFeatureSource::new(DEFAULT_ENDPOINT, Duration::from_secs(12)).unwrap();
        let url = source.request_url("BAN.DATA.GOUV:ban", &region(), 60);

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["source"], "BAN.DATA.GOUV:ban");
        assert_eq!(params["_limit"], "60");
        assert!(!params.contains_key("apikey"));
        assert!(!params.contains_key("language"));

        let geom: serde_json::Value = serde_json::from_str(&params["geom"]).unwrap();
        assert_eq!(geom, region().to_geojson());
    }

    #[test]
    fn test_optional_parameters() {
        let source = HttpFeatureSource::new("https://maps.example.com/reverse", Duration::from_secs(5))
            .unwrap()
            .with_api_key(Some("secret".into()))
            .with_language(Some("fr".into()));
        let url = source.request_url("addresses", &region(), 10);

        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(params["apikey"], "secret");
        assert_eq!(params["language"], "fr");
        assert_eq!(url.path(), "/reverse");
    }

    #[test]
    fn test_invalid_endpoint() {
        let err = HttpFeatureSource::new("not a url", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SourceError::Endpoint { .. }));
    }
}
