//! City extraction from free-form location strings.
//!
//! Job postings and scraped company records describe locations in many
//! shapes:
//! - With a postal code prefix: `"2100 København Ø"`
//! - With region and country: `"Taastrup, Region Hovedstaden, Danmark"`
//! - As a municipality: `"Høje-Taastrup Kommune"`
//! - With a district letter: `"Aarhus C"`
//!
//! This module reduces them to a bare city name suitable for
//! normalization and lookup. Every marker list and suffix pattern comes
//! from [`ExtractConfig`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use city_zip_location_models::ExtractConfig;
use regex::Regex;

use crate::LocationError;

/// A leading four-digit postal code followed by the rest of the location.
static POSTAL_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{4})\s+(.+)$").expect("valid regex"));

/// Parenthesized asides, e.g. `"Taastrup (Høje-Taastrup)"`.
static PARENTHESIZED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(.*?\)").expect("valid regex"));

/// Result of extracting a city from a raw location string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLocation {
    /// Bare city name, trimmed and non-empty.
    pub city: String,
    /// Postal code taken from a leading `"NNNN "` prefix, if present.
    pub postal_code: Option<String>,
}

/// Compiled extraction rules.
#[derive(Debug, Clone)]
pub struct CityExtractor {
    rejected_re: Option<Regex>,
    country_suffix_re: Option<Regex>,
    municipality_suffix_re: Option<Regex>,
    district_suffix_re: Option<Regex>,
    identity_mappings: BTreeMap<String, String>,
}

impl CityExtractor {
    /// Compiles the extraction rules.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Pattern`] if the configured district suffix
    /// pattern is not a valid regular expression.
    pub fn new(config: &ExtractConfig) -> Result<Self, LocationError> {
        let rejected_re = literal_alternation(&config.rejected_countries)
            .map(|alt| compile("rejected_countries", &format!(r"(?i)\b(?:{alt})\b")))
            .transpose()?;

        let country_suffix_re = literal_alternation(&config.country_suffixes)
            .map(|alt| compile("country_suffixes", &format!(r"(?i),?\s*\b(?:{alt})\b\s*$")))
            .transpose()?;

        let municipality_suffix_re = literal_alternation(&config.municipality_suffixes)
            .map(|alt| compile("municipality_suffixes", &format!(r"(?i)\s+(?:{alt})$")))
            .transpose()?;

        let district_suffix_re = config
            .district_suffix_pattern
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| compile("district_suffix_pattern", &format!(r"(?i)\s+(?:{p})$")))
            .transpose()?;

        let identity_mappings = config
            .identity_mappings
            .iter()
            .map(|(raw, city)| (identity_key(raw), city.trim().to_string()))
            .collect();

        Ok(Self {
            rejected_re,
            country_suffix_re,
            municipality_suffix_re,
            district_suffix_re,
            identity_mappings,
        })
    }

    /// Extracts the best-guess bare city name, or `None` for empty or
    /// out-of-country input.
    #[must_use]
    pub fn extract_city(&self, raw: Option<&str>) -> Option<String> {
        self.extract(raw).map(|location| location.city)
    }

    /// Extracts the city and any leading postal code.
    ///
    /// Steps, each applied to the output of the previous one:
    /// 1. Take the remainder after a leading `"NNNN "` postal code, then
    ///    strip a trailing country marker
    /// 2. Keep the part before the first comma
    /// 3. Remove parenthesized text
    /// 4. Map known municipality self-references to their city
    /// 5. Strip a trailing municipality suffix
    /// 6. Strip a trailing district/direction suffix
    #[must_use]
    pub fn extract(&self, raw: Option<&str>) -> Option<ExtractedLocation> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }

        if let Some(re) = &self.rejected_re
            && re.is_match(raw)
        {
            log::debug!("Rejecting out-of-country location '{raw}'");
            return None;
        }

        let (candidate, postal_code) = POSTAL_PREFIX_RE.captures(raw).map_or_else(
            || (raw.to_string(), None),
            |caps| (caps[2].to_string(), Some(caps[1].to_string())),
        );
        let candidate = strip_suffix(self.country_suffix_re.as_ref(), &candidate);

        let candidate = candidate.split(',').next().unwrap_or_default();
        let candidate = PARENTHESIZED_RE.replace_all(candidate, "");
        let candidate = candidate.trim();

        if let Some(city) = self.identity_mappings.get(&identity_key(candidate)) {
            return Some(ExtractedLocation {
                city: city.clone(),
                postal_code,
            });
        }

        let candidate = strip_suffix(self.municipality_suffix_re.as_ref(), candidate);
        let candidate = strip_suffix(self.district_suffix_re.as_ref(), &candidate);
        let city = candidate.trim();

        if city.is_empty() {
            return None;
        }

        Some(ExtractedLocation {
            city: city.to_string(),
            postal_code,
        })
    }
}

/// Lower-cased with whitespace runs collapsed to one space.
fn identity_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn strip_suffix(re: Option<&Regex>, text: &str) -> String {
    re.map_or_else(|| text.to_string(), |re| re.replace(text, "").to_string())
}

/// Builds an escaped `a|b|c` alternation from literal markers. Returns
/// `None` when there is nothing to match.
fn literal_alternation(markers: &[String]) -> Option<String> {
    let escaped: Vec<String> = markers
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(regex::escape)
        .collect();

    if escaped.is_empty() {
        None
    } else {
        Some(escaped.join("|"))
    }
}

fn compile(setting: &'static str, pattern: &str) -> Result<Regex, LocationError> {
    Regex::new(pattern).map_err(|source| LocationError::Pattern { setting, source })
}
