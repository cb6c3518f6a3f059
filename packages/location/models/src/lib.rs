#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the city and postal code resolution engine.
//!
//! This crate contains only data types, configuration structs, and simple
//! conversions. It has no heavyweight dependencies (no regex, no I/O).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single postal code in the reference data.
///
/// `postal_code` is the natural key. Many records may share the same
/// `normalized_city` (e.g. every "København X" district).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalRecord {
    /// Three or four digit postal code. Leading zeros are significant, so
    /// this is never parsed as an integer.
    pub postal_code: String,
    /// Display-form city name as the authoritative source provides it.
    pub canonical_city: String,
    /// Lookup key derived from `canonical_city`.
    pub normalized_city: String,
    /// Preference score, higher wins when disambiguating.
    pub weight: i32,
    /// Latitude (WGS84), if known.
    pub latitude: Option<f64>,
    /// Longitude (WGS84), if known.
    pub longitude: Option<f64>,
}

/// An alternate spelling or colloquial form of a city (e.g. "kbh").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityAlias {
    /// Normalized alias. Unique.
    pub alias: String,
    /// The normalized city key this alias points at.
    pub normalized_city: String,
}

/// Outcome of resolving a city name to a postal code.
///
/// "No result" is expressed through `resolved_city`/`best_code` being
/// `None`, never through an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    /// The raw input string.
    pub input: String,
    /// The normalized key used for the reference lookup (after alias
    /// resolution).
    pub normalized: String,
    /// Canonical city name of the chosen record.
    pub resolved_city: Option<String>,
    /// Every postal code matching the key, ascending.
    pub candidate_codes: Vec<String>,
    /// The chosen postal code.
    pub best_code: Option<String>,
    /// Whether the key came from the alias table.
    pub used_alias: bool,
    /// Whether the caller's context hint decided the pick.
    pub used_context: bool,
}

impl ResolutionResult {
    /// Builds a result with no candidates.
    #[must_use]
    pub fn unresolved(input: &str, normalized: String, used_alias: bool) -> Self {
        Self {
            input: input.to_string(),
            normalized,
            resolved_city: None,
            candidate_codes: Vec::new(),
            best_code: None,
            used_alias,
            used_context: false,
        }
    }

    /// Returns `true` if a postal code was chosen.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.best_code.is_some()
    }
}

/// A single character folding rule (e.g. `æ` → `ae`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldRule {
    /// Text to replace (already lower-case).
    pub from: String,
    /// Replacement text.
    pub to: String,
}

/// Normalizer settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Character folding table.
    #[serde(default)]
    pub folding: Vec<FoldRule>,
}

/// City extraction settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Markers that identify a location outside the supported country.
    /// Any occurrence (case-insensitive, whole word) rejects the input.
    #[serde(default)]
    pub rejected_countries: Vec<String>,
    /// Trailing country names/codes to strip (e.g. "Danmark", "DK").
    #[serde(default)]
    pub country_suffixes: Vec<String>,
    /// Trailing municipality tokens to strip (e.g. "Kommune").
    #[serde(default)]
    pub municipality_suffixes: Vec<String>,
    /// Regular expression matching the district/direction token after a
    /// city name, without the leading whitespace or end anchor.
    #[serde(default)]
    pub district_suffix_pattern: Option<String>,
    /// Lower-cased raw forms that map directly to a bare city name
    /// (e.g. "københavns kommune" → "København").
    #[serde(default)]
    pub identity_mappings: BTreeMap<String, String>,
}

/// Disambiguation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisambiguationConfig {
    /// City name → postal codes to prefer, in order, over the weight rule.
    #[serde(default)]
    pub preferred_codes: BTreeMap<String, Vec<String>>,
}

/// A city whose postal codes get elevated weights on import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightTier {
    /// City name (normalized on load).
    pub city: String,
    /// The city's "primary" postal codes.
    #[serde(default)]
    pub primary_codes: Vec<String>,
}

/// Weight tier settings used when importing reference data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightConfig {
    /// Weight of a tier city's primary codes.
    #[serde(default = "default_primary_weight")]
    pub primary: i32,
    /// Weight of a tier city's other codes.
    #[serde(default = "default_secondary_weight")]
    pub secondary: i32,
    /// Weight of every other code.
    #[serde(default = "default_weight")]
    pub default: i32,
    /// Tier cities.
    #[serde(default)]
    pub tiers: Vec<WeightTier>,
}

const fn default_primary_weight() -> i32 {
    100
}

const fn default_secondary_weight() -> i32 {
    50
}

const fn default_weight() -> i32 {
    10
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_weight(),
            secondary: default_secondary_weight(),
            default: default_weight(),
            tiers: Vec::new(),
        }
    }
}

/// All injected configuration consumed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationConfig {
    /// Normalizer settings.
    #[serde(default)]
    pub normalize: NormalizeConfig,
    /// City extraction settings.
    #[serde(default)]
    pub extract: ExtractConfig,
    /// Disambiguation settings.
    #[serde(default)]
    pub disambiguation: DisambiguationConfig,
    /// Import weight tiers.
    #[serde(default)]
    pub weights: WeightConfig,
}

/// Counters accumulated while resolving a batch of locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    /// Number of queries processed.
    pub total: u64,
    /// Queries that produced a postal code.
    pub resolved: u64,
    /// Queries whose city had no reference candidates.
    pub unresolved: u64,
    /// Queries where no city could be extracted (empty or foreign).
    pub rejected: u64,
    /// Resolved queries that went through the alias table.
    pub via_alias: u64,
    /// Resolved queries decided by the context hint.
    pub via_context: u64,
}

impl BatchStats {
    /// Adds another accumulator into this one.
    pub const fn merge(&mut self, other: &Self) {
        self.total += other.total;
        self.resolved += other.resolved;
        self.unresolved += other.unresolved;
        self.rejected += other.rejected;
        self.via_alias += other.via_alias;
        self.via_context += other.via_context;
    }

    /// Records one query outcome. `None` means extraction rejected the
    /// input.
    pub const fn record(&mut self, result: Option<&ResolutionResult>) {
        self.total += 1;
        match result {
            None => self.rejected += 1,
            Some(r) if r.best_code.is_some() => {
                self.resolved += 1;
                if r.used_alias {
                    self.via_alias += 1;
                }
                if r.used_context {
                    self.via_context += 1;
                }
            }
            Some(_) => self.unresolved += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_config_defaults_apply_to_missing_fields() {
        let config: WeightConfig = toml::from_str("primary = 200").unwrap();
        assert_eq!(config.primary, 200);
        assert_eq!(config.secondary, 50);
        assert_eq!(config.default, 10);
        assert!(config.tiers.is_empty());
    }

    #[test]
    fn empty_document_is_a_valid_config() {
        let config: LocationConfig = toml::from_str("").unwrap();
        assert_eq!(config, LocationConfig::default());
    }

    #[test]
    fn batch_stats_record_and_merge() {
        let mut resolved = ResolutionResult::unresolved("Aarhus", "aarhus".to_string(), true);
        resolved.best_code = Some("8000".to_string());
        resolved.resolved_city = Some("Aarhus".to_string());
        let unresolved = ResolutionResult::unresolved("Nowhere", "nowhere".to_string(), false);

        let mut a = BatchStats::default();
        a.record(Some(&resolved));
        a.record(None);

        let mut b = BatchStats::default();
        b.record(Some(&unresolved));

        a.merge(&b);
        assert_eq!(
            a,
            BatchStats {
                total: 3,
                resolved: 1,
                unresolved: 1,
                rejected: 1,
                via_alias: 1,
                via_context: 0,
            }
        );
    }
}
