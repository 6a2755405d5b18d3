//! Nearest-address reverse geocoding.
//!
//! Layers are tried strictly in order; the first one returning at least one
//! usable feature wins and later layers are never queried. Failures never
//! escape: they end up in the [`Diagnostic`] returned with the result.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::label::{default_rules, derive_label, LabelRule};
use crate::models::{AddressFeature, Coordinate, Diagnostic, ResolvedAddress};
use crate::region::{SearchRegion, DEFAULT_VERTICES};
use crate::source::{parse_features, FeatureSource};

/// Default result cap per request
pub const DEFAULT_LIMIT: usize = 60;

/// Outcome of a resolve call: the address if any, and the last attempt's diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub result: Option<ResolvedAddress>,
    pub diagnostic: Diagnostic,
}

impl Resolution {
    fn not_found(diagnostic: Diagnostic) -> Self {
        Self {
            result: None,
            diagnostic,
        }
    }

    pub fn is_found(&self) -> bool {
        self.result.is_some()
    }

    pub fn into_parts(self) -> (Option<ResolvedAddress>, Diagnostic) {
        (self.result, self.diagnostic)
    }
}

/// Reverse geocoder over a [`FeatureSource`]
pub struct Resolver<S> {
    source: S,
    vertices: usize,
    limit: usize,
    label_rules: Vec<LabelRule>,
}

impl<S: FeatureSource> Resolver<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            vertices: DEFAULT_VERTICES,
            limit: DEFAULT_LIMIT,
            label_rules: default_rules(),
        }
    }

    pub fn with_vertices(mut self, vertices: usize) -> Self {
        self.vertices = vertices;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_label_rules(mut self, rules: Vec<LabelRule>) -> Self {
        self.label_rules = rules;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Find the address closest to `coordinate` within `radius_meters`,
    /// trying `layers` in priority order.
    pub async fn resolve(
        &self,
        coordinate: Coordinate,
        radius_meters: f64,
        layers: &[String],
    ) -> Resolution {
        let region = match SearchRegion::circle(coordinate, radius_meters, self.vertices) {
            Ok(region) => region,
            Err(e) => {
                warn!("Cannot build search region around {}: {}", coordinate, e);
                return Resolution::not_found(Diagnostic::failed(None, e));
            }
        };

        let mut last_diag = Diagnostic::default();

        for layer in layers {
            match self.try_layer(&region, layer).await {
                (Some(found), diag) => {
                    info!("Resolved {} to '{}' ({})", coordinate, found.adresse, layer);
                    return Resolution {
                        result: Some(found),
                        diagnostic: diag,
                    };
                }
                (None, diag) => last_diag = diag,
            }
        }

        info!("No address found around {} in {} layer(s)", coordinate, layers.len());
        Resolution::not_found(last_diag)
    }

    async fn try_layer(
        &self,
        region: &SearchRegion,
        layer: &str,
    ) -> (Option<ResolvedAddress>, Diagnostic) {
        debug!("Querying layer {} (limit {})", layer, self.limit);

        let outcome = match self.source.fetch(layer, region, self.limit).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Layer {} request failed: {}", layer, e);
                return (None, Diagnostic::failed(Some(layer), e));
            }
        };

        let mut diag = Diagnostic::for_layer(layer);
        diag.http_status = Some(outcome.status);

        if !outcome.is_success() {
            warn!("Layer {} returned status {}", layer, outcome.status);
            diag.set_body(&outcome.body);
            return (None, diag);
        }

        let collection = match parse_features(&outcome.body) {
            Ok(c) => c,
            Err(e) => {
                warn!("Layer {} returned an unreadable body: {}", layer, e);
                diag.error = Some(format!("invalid response body: {}", e));
                return (None, diag);
            }
        };

        diag.feature_count = Some(collection.total);
        debug!(
            "Layer {}: {} feature(s), {} with a point geometry",
            layer,
            collection.total,
            collection.features.len()
        );

        let Some(best) = nearest(&region.center(), &collection.features) else {
            return (None, diag);
        };

        let resolved = ResolvedAddress {
            adresse: derive_label(&self.label_rules, &best.properties),
            lat: best.coordinate.lat,
            lon: best.coordinate.lon,
            layer: layer.to_string(),
        };

        (Some(resolved), diag)
    }
}

/// Candidate with the smallest degree-space distance to `origin`.
///
/// Ties keep the earliest candidate.
pub fn nearest<'a>(
    origin: &Coordinate,
    candidates: &'a [AddressFeature],
) -> Option<&'a AddressFeature> {
    let mut best: Option<(&AddressFeature, f64)> = None;

    for candidate in candidates {
        let dist = origin.degree_distance_sq(&candidate.coordinate);
        match best {
            Some((_, best_dist)) if best_dist <= dist => {}
            _ => best = Some((candidate, dist)),
        }
    }

    best.map(|(f, _)| f)
}
