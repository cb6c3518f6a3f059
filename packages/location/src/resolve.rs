//! City name to postal code resolution.
//!
//! Data flow:
//!
//! raw location → [`CityExtractor`] → [`Normalizer`] → alias lookup →
//! candidate lookup → context hint → [`DisambiguationPolicy`] →
//! [`ResolutionResult`]

use city_zip_location_models::{LocationConfig, PostalRecord, ResolutionResult};

use crate::LocationError;
use crate::disambiguate::DisambiguationPolicy;
use crate::extract::CityExtractor;
use crate::normalize::Normalizer;
use crate::reference;
use crate::store::{ReferenceStore, StoreError};

/// Resolves city names against a [`ReferenceStore`].
///
/// Stateless between calls; safe to share across threads as long as the
/// store is.
#[derive(Debug)]
pub struct Resolver<S> {
    normalizer: Normalizer,
    extractor: CityExtractor,
    policy: DisambiguationPolicy,
    store: S,
}

impl<S: ReferenceStore> Resolver<S> {
    /// Builds a resolver from configuration and a store.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Pattern`] if a configured pattern does not
    /// compile.
    pub fn new(config: &LocationConfig, store: S) -> Result<Self, LocationError> {
        let normalizer = Normalizer::new(&config.normalize.folding);
        let extractor = CityExtractor::new(&config.extract)?;
        let policy = DisambiguationPolicy::new(&config.disambiguation, &normalizer);

        Ok(Self {
            normalizer,
            extractor,
            policy,
            store,
        })
    }

    /// The key reference data is indexed under: district and municipality
    /// suffixes are stripped before normalizing, so "København Ø" and
    /// "København K" share the key "kobenhavn".
    #[must_use]
    pub fn reference_key(&self, city: &str) -> String {
        reference::reference_key(&self.extractor, &self.normalizer, city)
    }

    /// Resolves a city name to its best postal code.
    ///
    /// `context_hint` is a postal code known from a related entity (e.g.
    /// the company's address). It decides the pick only if it exactly
    /// equals one of several candidates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the reference store fails. Empty or
    /// unknown input is an unresolved `Ok`.
    pub fn resolve(
        &self,
        raw_city: &str,
        context_hint: Option<&str>,
    ) -> Result<ResolutionResult, StoreError> {
        let mut normalized = self.normalizer.normalize(raw_city);
        if normalized.is_empty() {
            return Ok(ResolutionResult::unresolved(raw_city, normalized, false));
        }

        let mut used_alias = false;
        if let Some(target) = self.store.find_alias(&normalized)?
            && target != normalized
        {
            log::debug!("Alias '{normalized}' -> '{target}'");
            normalized = target;
            used_alias = true;
        }

        let candidates = self.store.find_by_normalized_city(&normalized)?;
        if candidates.is_empty() {
            log::debug!("No postal codes for '{normalized}'");
            return Ok(ResolutionResult::unresolved(raw_city, normalized, used_alias));
        }

        let (best, used_context) = self.choose(&normalized, &candidates, context_hint);

        let mut candidate_codes: Vec<String> =
            candidates.iter().map(|r| r.postal_code.clone()).collect();
        candidate_codes.sort();
        candidate_codes.dedup();

        Ok(ResolutionResult {
            input: raw_city.to_string(),
            normalized,
            resolved_city: best.map(|r| r.canonical_city.clone()),
            candidate_codes,
            best_code: best.map(|r| r.postal_code.clone()),
            used_alias,
            used_context,
        })
    }

    /// Extracts the city from a free-form location and resolves it.
    ///
    /// Without an explicit `context_hint`, a postal code prefix in the
    /// location itself (e.g. `"2100 København Ø"`) serves as the hint.
    /// Returns `Ok(None)` when nothing could be extracted (empty input or
    /// a rejected country).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only if the reference store fails.
    pub fn resolve_location(
        &self,
        raw_location: &str,
        context_hint: Option<&str>,
    ) -> Result<Option<ResolutionResult>, StoreError> {
        let Some(extracted) = self.extractor.extract(Some(raw_location)) else {
            log::debug!("Nothing to resolve in '{raw_location}'");
            return Ok(None);
        };

        let hint = context_hint.or(extracted.postal_code.as_deref());
        let mut result = self.resolve(&extracted.city, hint)?;
        result.input = raw_location.to_string();

        Ok(Some(result))
    }

    fn choose<'a>(
        &self,
        normalized: &str,
        candidates: &'a [PostalRecord],
        context_hint: Option<&str>,
    ) -> (Option<&'a PostalRecord>, bool) {
        if let [only] = candidates {
            return (Some(only), false);
        }

        if let Some(hint) = context_hint
            && let Some(record) = candidates.iter().find(|r| r.postal_code == hint)
        {
            log::debug!("'{normalized}': context hint {hint} matched");
            return (Some(record), true);
        }

        (
            self.policy.pick(normalized, candidates).map(|p| p.record),
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::store::ReferenceSnapshot;
    use crate::store::tests::{alias, record};

    fn resolver(
        records: Vec<PostalRecord>,
        aliases: &[city_zip_location_models::CityAlias],
    ) -> Resolver<ReferenceSnapshot> {
        Resolver::new(
            &default_config(),
            ReferenceSnapshot::new(records, aliases),
        )
        .unwrap()
    }

    fn danish() -> Resolver<ReferenceSnapshot> {
        resolver(
            vec![
                record("1050", "København K", "kobenhavn", 100),
                record("2100", "København Ø", "kobenhavn", 50),
                record("2200", "København N", "kobenhavn", 50),
                record("8000", "Aarhus C", "aarhus", 100),
                record("8200", "Aarhus N", "aarhus", 50),
                record("2630", "Taastrup", "taastrup", 10),
                record("2000", "Frederiksberg", "frederiksberg", 10),
                record("1000", "Frederiksberg", "frederiksberg", 10),
            ],
            &[alias("kbh", "kobenhavn"), alias("cph", "kobenhavn")],
        )
    }

    #[test]
    fn single_candidate_ignores_context() {
        let r = danish();
        let result = r.resolve("Taastrup", Some("9999")).unwrap();
        assert_eq!(result.best_code.as_deref(), Some("2630"));
        assert_eq!(result.resolved_city.as_deref(), Some("Taastrup"));
        assert!(!result.used_context);

        let result = r.resolve("Taastrup", Some("2630")).unwrap();
        assert_eq!(result.best_code.as_deref(), Some("2630"));
        assert!(!result.used_context);
    }

    #[test]
    fn context_hint_beats_weight() {
        let r = danish();
        let result = r.resolve("Aarhus", Some("8200")).unwrap();
        assert_eq!(result.best_code.as_deref(), Some("8200"));
        assert_eq!(result.resolved_city.as_deref(), Some("Aarhus N"));
        assert!(result.used_context);
    }

    #[test]
    fn context_hint_must_match_exactly() {
        let r = danish();
        let result = r.resolve("Aarhus", Some("820")).unwrap();
        assert_eq!(result.best_code.as_deref(), Some("8000"));
        assert!(!result.used_context);
    }

    #[test]
    fn weight_decides_without_context() {
        let r = danish();
        let result = r.resolve("aarhus", None).unwrap();
        assert_eq!(result.best_code.as_deref(), Some("8000"));
        assert_eq!(result.candidate_codes, vec!["8000", "8200"]);
    }

    #[test]
    fn equal_weights_pick_lowest_code() {
        let r = danish();
        let result = r.resolve("Frederiksberg", None).unwrap();
        assert_eq!(result.best_code.as_deref(), Some("1000"));
    }

    #[test]
    fn alias_resolves_to_canonical_city() {
        let r = danish();
        let result = r.resolve("KBH", None).unwrap();
        assert!(result.used_alias);
        assert_eq!(result.normalized, "kobenhavn");
        assert_eq!(result.resolved_city.as_deref(), Some("København K"));
        assert_eq!(result.best_code.as_deref(), Some("1050"));
        assert_eq!(result.candidate_codes, vec!["1050", "2100", "2200"]);
    }

    #[test]
    fn direct_match_does_not_use_alias() {
        let r = danish();
        let result = r.resolve("København", None).unwrap();
        assert!(!result.used_alias);
        assert_eq!(result.input, "København");
        assert_eq!(result.normalized, "kobenhavn");
    }

    #[test]
    fn preferred_codes_apply_to_capital() {
        let r = resolver(
            vec![
                record("2100", "København Ø", "kobenhavn", 500),
                record("1100", "København K", "kobenhavn", 100),
                record("1050", "København K", "kobenhavn", 100),
            ],
            &[],
        );
        // Default config prefers 1000, 1050, 1100, ... in that order.
        let result = r.resolve("København", None).unwrap();
        assert_eq!(result.best_code.as_deref(), Some("1050"));
    }

    #[test]
    fn empty_and_unknown_input_are_unresolved() {
        let r = danish();
        for raw in ["", "   ", "!!!", "Nonexistentville"] {
            let result = r.resolve(raw, None).unwrap();
            assert_eq!(result.resolved_city, None, "{raw:?}");
            assert_eq!(result.best_code, None, "{raw:?}");
            assert!(result.candidate_codes.is_empty());
            assert!(!result.is_resolved());
        }
    }

    #[test]
    fn resolution_is_repeatable() {
        let r = danish();
        let first = r.resolve("København", Some("2200")).unwrap();
        let second = r.resolve("København", Some("2200")).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[test]
    fn resolve_location_uses_postal_prefix_as_context() {
        let r = danish();
        let result = r.resolve_location("2100 København Ø", None).unwrap().unwrap();
        assert_eq!(result.input, "2100 København Ø");
        assert_eq!(result.best_code.as_deref(), Some("2100"));
        assert!(result.used_context);
    }

    #[test]
    fn resolve_location_prefers_explicit_context() {
        let r = danish();
        let result = r
            .resolve_location("2100 København Ø", Some("2200"))
            .unwrap()
            .unwrap();
        assert_eq!(result.best_code.as_deref(), Some("2200"));
    }

    #[test]
    fn resolve_location_strips_region_and_country() {
        let r = danish();
        let result = r
            .resolve_location("Taastrup, Region Hovedstaden, Danmark", None)
            .unwrap()
            .unwrap();
        assert_eq!(result.best_code.as_deref(), Some("2630"));
    }

    #[test]
    fn resolve_location_rejects_foreign_and_empty() {
        let r = danish();
        assert_eq!(r.resolve_location("Stockholm, Sverige", None).unwrap(), None);
        assert_eq!(r.resolve_location("", None).unwrap(), None);
    }

    #[test]
    fn no_break_space_separates_words() {
        let r = resolver(vec![record("6960", "Hvide Sande", "hvide sande", 10)], &[]);
        let result = r
            .resolve_location("Hvide\u{a0}Sande, Danmark", None)
            .unwrap()
            .unwrap();
        assert_eq!(result.normalized, "hvide sande");
        assert_eq!(result.best_code.as_deref(), Some("6960"));
    }

    #[test]
    fn reference_key_strips_districts() {
        let r = danish();
        assert_eq!(r.reference_key("København Ø"), "kobenhavn");
        assert_eq!(r.reference_key("Aarhus C"), "aarhus");
        assert_eq!(r.reference_key("Høje-Taastrup"), "hoje-taastrup");
    }

    struct FailingStore;

    impl ReferenceStore for FailingStore {
        fn find_by_normalized_city(&self, _: &str) -> Result<Vec<PostalRecord>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        fn find_alias(&self, _: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn store_failure_is_distinct_from_no_result() {
        let r = Resolver::new(&default_config(), FailingStore).unwrap();
        assert!(matches!(
            r.resolve("Aarhus", None),
            Err(StoreError::Unavailable(_))
        ));
        // Empty input never reaches the store.
        assert!(r.resolve("", None).unwrap().best_code.is_none());
    }
}
