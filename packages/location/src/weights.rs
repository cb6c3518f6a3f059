//! Declarative weight tiers for imported reference data.
//!
//! A handful of well-known "primary" postal codes per major city get the
//! highest weight, the rest of that city's codes get a lower tier, and
//! every other code gets the default. Adding a major city is a
//! configuration change.

use std::collections::{BTreeMap, BTreeSet};

use city_zip_location_models::WeightConfig;

use crate::normalize::Normalizer;

/// Weight lookup compiled from [`WeightConfig`].
#[derive(Debug, Clone)]
pub struct WeightTable {
    primary: i32,
    secondary: i32,
    default: i32,
    tiers: BTreeMap<String, BTreeSet<String>>,
}

impl WeightTable {
    /// Compiles the table, normalizing tier city names.
    #[must_use]
    pub fn new(config: &WeightConfig, normalizer: &Normalizer) -> Self {
        let mut tiers: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for tier in &config.tiers {
            let city = normalizer.normalize(&tier.city);
            if city.is_empty() {
                log::warn!("Ignoring weight tier with empty city '{}'", tier.city);
                continue;
            }
            tiers
                .entry(city)
                .or_default()
                .extend(tier.primary_codes.iter().map(|c| c.trim().to_string()));
        }

        Self {
            primary: config.primary,
            secondary: config.secondary,
            default: config.default,
            tiers,
        }
    }

    /// Returns the weight for a postal code belonging to `normalized_city`.
    #[must_use]
    pub fn weight_for(&self, postal_code: &str, normalized_city: &str) -> i32 {
        match self.tiers.get(normalized_city) {
            Some(primary_codes) if primary_codes.contains(postal_code) => self.primary,
            Some(_) => self.secondary,
            None => self.default,
        }
    }
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::new(&WeightConfig::default(), &Normalizer::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use city_zip_location_models::WeightTier;

    fn table() -> WeightTable {
        let config = WeightConfig {
            primary: 100,
            secondary: 50,
            default: 10,
            tiers: vec![
                WeightTier {
                    city: "Aarhus".to_string(),
                    primary_codes: vec!["8000".to_string()],
                },
                WeightTier {
                    city: "København".to_string(),
                    primary_codes: vec!["1000".to_string(), " 1050 ".to_string()],
                },
            ],
        };
        WeightTable::new(&config, &Normalizer::default())
    }

    #[test]
    fn primary_codes_get_top_tier() {
        let table = table();
        assert_eq!(table.weight_for("8000", "aarhus"), 100);
        assert_eq!(table.weight_for("1050", "kobenhavn"), 100);
    }

    #[test]
    fn other_codes_of_tier_city_get_secondary() {
        let table = table();
        assert_eq!(table.weight_for("8200", "aarhus"), 50);
        assert_eq!(table.weight_for("2100", "kobenhavn"), 50);
    }

    #[test]
    fn everything_else_gets_default() {
        let table = table();
        assert_eq!(table.weight_for("5000", "odense"), 10);
        // A primary code of another city does not elevate this one.
        assert_eq!(table.weight_for("8000", "odense"), 10);
    }

    #[test]
    fn default_table_has_no_tiers() {
        assert_eq!(WeightTable::default().weight_for("8000", "aarhus"), 10);
    }
}
