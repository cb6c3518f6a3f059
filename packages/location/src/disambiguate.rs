//! Tie-break rules for cities that own several postal codes.
//!
//! Applied only after alias resolution and context matching have failed
//! to single out a code. The order is:
//!
//! 1. **Preferred codes** configured for the city, in list order
//! 2. **Weight**, highest first
//! 3. **Postal code**, lowest first (string order on fixed-width codes)
//!
//! Records tied on both weight and code are a data-quality problem; the
//! first one in store order wins and a warning is logged.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use city_zip_location_models::{DisambiguationConfig, PostalRecord};

use crate::normalize::Normalizer;

/// Which rule decided a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickReason {
    /// A configured preferred code was present.
    PreferredCode,
    /// The record had the strictly highest weight.
    Weight,
    /// Weights tied; the lowest postal code won.
    CodeOrder,
}

/// The chosen record and the rule that chose it.
#[derive(Debug, Clone, Copy)]
pub struct Pick<'a> {
    /// The winning record.
    pub record: &'a PostalRecord,
    /// The rule that decided.
    pub reason: PickReason,
}

/// Per-city override lists plus the weight/code ordering.
#[derive(Debug, Clone, Default)]
pub struct DisambiguationPolicy {
    preferred_codes: BTreeMap<String, Vec<String>>,
}

impl DisambiguationPolicy {
    /// Builds the policy. Override table keys are normalized so they can
    /// be written in display form ("København") in configuration.
    #[must_use]
    pub fn new(config: &DisambiguationConfig, normalizer: &Normalizer) -> Self {
        let preferred_codes = config
            .preferred_codes
            .iter()
            .map(|(city, codes)| {
                let codes = codes.iter().map(|c| c.trim().to_string()).collect();
                (normalizer.normalize(city), codes)
            })
            .filter(|(city, _)| !city.is_empty())
            .collect();

        Self { preferred_codes }
    }

    /// Returns the preferred code list for a normalized city, if any.
    #[must_use]
    pub fn preferred_codes(&self, normalized_city: &str) -> Option<&[String]> {
        self.preferred_codes
            .get(normalized_city)
            .map(Vec::as_slice)
    }

    /// Picks one record. Returns `None` only if `candidates` is empty.
    #[must_use]
    pub fn pick<'a>(
        &self,
        normalized_city: &str,
        candidates: &'a [PostalRecord],
    ) -> Option<Pick<'a>> {
        if let Some(preferred) = self.preferred_codes(normalized_city) {
            for code in preferred {
                if let Some(record) = candidates.iter().find(|r| r.postal_code == *code) {
                    log::trace!("'{normalized_city}': preferred code {code} chosen");
                    return Some(Pick {
                        record,
                        reason: PickReason::PreferredCode,
                    });
                }
            }
        }

        let mut iter = candidates.iter();
        let mut best = iter.next()?;

        for candidate in iter {
            match rank(candidate, best) {
                Ordering::Less => best = candidate,
                Ordering::Equal => {
                    log::warn!(
                        "'{normalized_city}': postal code {} appears more than once with weight {}; keeping the first",
                        candidate.postal_code,
                        candidate.weight
                    );
                }
                Ordering::Greater => {}
            }
        }

        let reason = if candidates
            .iter()
            .any(|r| r.weight == best.weight && r.postal_code != best.postal_code)
        {
            PickReason::CodeOrder
        } else {
            PickReason::Weight
        };

        log::trace!(
            "'{normalized_city}': {} chosen by {reason:?}",
            best.postal_code
        );

        Some(Pick {
            record: best,
            reason,
        })
    }
}

/// Orders records best first: weight descending, then code ascending.
fn rank(a: &PostalRecord, b: &PostalRecord) -> Ordering {
    b.weight
        .cmp(&a.weight)
        .then_with(|| a.postal_code.cmp(&b.postal_code))
}
