//! Turning raw reference rows into keyed [`PostalRecord`]s and
//! [`CityAlias`]es.
//!
//! Reference data is keyed the same way lookups are: the city is run
//! through the [`CityExtractor`] (so district suffixes like "Ø" or "C"
//! fall away) and then the [`Normalizer`].

use city_zip_location_models::{CityAlias, LocationConfig, PostalRecord};

use crate::LocationError;
use crate::extract::CityExtractor;
use crate::normalize::Normalizer;
use crate::weights::WeightTable;

pub(crate) fn reference_key(
    extractor: &CityExtractor,
    normalizer: &Normalizer,
    city: &str,
) -> String {
    let bare = extractor
        .extract_city(Some(city))
        .unwrap_or_else(|| city.to_string());
    normalizer.normalize(&bare)
}

/// Whether `code` looks like a Danish postal code (3 or 4 ASCII digits).
#[must_use]
pub fn is_postal_code(code: &str) -> bool {
    (3..=4).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_digit())
}

/// Builds reference records with the same keying rules the resolver uses.
#[derive(Debug)]
pub struct ReferenceBuilder {
    normalizer: Normalizer,
    extractor: CityExtractor,
    weights: WeightTable,
}

impl ReferenceBuilder {
    /// # Errors
    ///
    /// Returns [`LocationError::Pattern`] if a configured pattern does not
    /// compile.
    pub fn new(config: &LocationConfig) -> Result<Self, LocationError> {
        let normalizer = Normalizer::new(&config.normalize.folding);
        let extractor = CityExtractor::new(&config.extract)?;
        let weights = WeightTable::new(&config.weights, &normalizer);

        Ok(Self {
            normalizer,
            extractor,
            weights,
        })
    }

    /// See [`crate::resolve::Resolver::reference_key`].
    #[must_use]
    pub fn reference_key(&self, city: &str) -> String {
        reference_key(&self.extractor, &self.normalizer, city)
    }

    /// Builds one postal record.
    ///
    /// Returns `None` (and logs) when the code is not a postal code or the
    /// city has no usable key.
    #[must_use]
    pub fn record(
        &self,
        postal_code: &str,
        city: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Option<PostalRecord> {
        let postal_code = postal_code.trim();
        let city = city.trim();

        if !is_postal_code(postal_code) {
            log::warn!("Skipping invalid postal code '{postal_code}' for '{city}'");
            return None;
        }

        let normalized_city = self.reference_key(city);
        if normalized_city.is_empty() {
            log::warn!("Skipping postal code {postal_code}: empty city");
            return None;
        }

        Some(PostalRecord {
            postal_code: postal_code.to_string(),
            canonical_city: city.to_string(),
            weight: self.weights.weight_for(postal_code, &normalized_city),
            normalized_city,
            latitude,
            longitude,
        })
    }

    /// Builds one alias. The alias side is only normalized; the target is
    /// keyed like a reference city.
    #[must_use]
    pub fn alias(&self, alias: &str, city: &str) -> Option<CityAlias> {
        let key = self.normalizer.normalize(alias);
        let target = self.reference_key(city);

        if key.is_empty() || target.is_empty() {
            log::warn!("Skipping alias '{alias}' -> '{city}': empty after normalization");
            return None;
        }

        Some(CityAlias {
            alias: key,
            normalized_city: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;

    fn builder() -> ReferenceBuilder {
        ReferenceBuilder::new(&default_config()).unwrap()
    }

    #[test]
    fn postal_code_shape() {
        assert!(is_postal_code("2100"));
        assert!(is_postal_code("800"));
        assert!(!is_postal_code("21000"));
        assert!(!is_postal_code("21a0"));
        assert!(!is_postal_code(""));
    }

    #[test]
    fn districts_share_a_key_and_keep_their_display_name() {
        let b = builder();
        let k = b.record("1050", "København K", None, None).unwrap();
        let o = b.record("2100", " København Ø ", None, None).unwrap();

        assert_eq!(k.normalized_city, "kobenhavn");
        assert_eq!(o.normalized_city, "kobenhavn");
        assert_eq!(o.canonical_city, "København Ø");
        assert_eq!(k.weight, 100);
        assert_eq!(o.weight, 50);
    }

    #[test]
    fn untiered_city_gets_default_weight() {
        let r = builder()
            .record("2630", "Taastrup", Some(55.65), Some(12.29))
            .unwrap();
        assert_eq!(r.weight, 10);
        assert_eq!(r.latitude, Some(55.65));
    }

    #[test]
    fn invalid_rows_are_skipped() {
        let b = builder();
        assert!(b.record("DK-2100", "København Ø", None, None).is_none());
        assert!(b.record("2100", "  ", None, None).is_none());
    }

    #[test]
    fn alias_targets_are_reference_keys() {
        let a = builder().alias("KBH", "København K").unwrap();
        assert_eq!(a.alias, "kbh");
        assert_eq!(a.normalized_city, "kobenhavn");
        assert!(builder().alias("!!", "Aarhus").is_none());
    }
}
