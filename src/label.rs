//! Label extraction from free-form feature properties.
//!
//! Upstream layers carry no common schema, so the label is found by
//! evaluating an ordered list of probe rules against the property map and
//! keeping the first non-empty value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label used when no rule matches
pub const UNKNOWN_ADDRESS: &str = "Adresse inconnue";

/// One probe against a feature's properties.
///
/// In TOML a plain string is a `Field`, an array of strings a `Join`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelRule {
    /// A single string property
    Field(String),
    /// Several string properties joined by a space, skipping missing ones
    Join(Vec<String>),
}

impl LabelRule {
    pub fn field(name: &str) -> Self {
        Self::Field(name.to_string())
    }

    /// Trimmed, non-empty value for this rule
    pub fn probe(&self, properties: &Map<String, Value>) -> Option<String> {
        let value = match self {
            LabelRule::Field(name) => string_property(properties, name)?.to_string(),
            LabelRule::Join(names) => names
                .iter()
                .filter_map(|n| string_property(properties, n))
                .collect::<Vec<_>>()
                .join(" "),
        };

        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

fn string_property<'a>(properties: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Full name, then generic label, then street number + name (BAN layers)
pub fn default_rules() -> Vec<LabelRule> {
    vec![
        LabelRule::field("nom_complet"),
        LabelRule::field("label"),
        LabelRule::field("numero_nom_voie"),
    ]
}

/// First matching rule's value, or [`UNKNOWN_ADDRESS`]
pub fn derive_label(rules: &[LabelRule], properties: &Map<String, Value>) -> String {
    rules
        .iter()
        .find_map(|rule| rule.probe(properties))
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}
