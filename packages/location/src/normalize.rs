//! City name normalization.
//!
//! Produces the comparable key used for every reference lookup. The same
//! pipeline runs when reference data is imported and when a query is
//! resolved, so "KØBENHAVN" and "København" meet at "kobenhavn".

use std::sync::LazyLock;

use city_zip_location_models::FoldRule;
use regex::Regex;

/// Characters that survive normalization are `[a-z0-9 -]`.
static DISALLOWED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9 \-]+").expect("valid regex"));

/// Danish folding table used when no configuration is supplied.
const DEFAULT_FOLDING: &[(&str, &str)] = &[("æ", "ae"), ("ø", "o"), ("å", "aa")];

/// Canonicalizes raw city names into lookup keys.
///
/// The pipeline:
/// 1. Lowercase
/// 2. Fold language-specific characters (longest rule first)
/// 3. Strip everything outside `[a-z0-9 -]`
/// 4. Collapse whitespace and trim
///
/// The result is idempotent: normalizing a key again returns it unchanged.
#[derive(Debug, Clone)]
pub struct Normalizer {
    folding: Vec<FoldRule>,
}

impl Normalizer {
    /// Builds a normalizer from a folding table.
    ///
    /// Rule sources are lower-cased, rules with an empty source are
    /// dropped, and the table is ordered longest source first so that a
    /// multi-character rule wins over any single-character rule it
    /// overlaps with.
    ///
    /// A rule whose source consists only of key characters (`[a-z0-9 -]`)
    /// could fire again on an already normalized key, so it is dropped
    /// with a warning.
    #[must_use]
    pub fn new(folding: &[FoldRule]) -> Self {
        let mut folding: Vec<FoldRule> = folding
            .iter()
            .map(|rule| FoldRule {
                from: rule.from.to_lowercase(),
                to: rule.to.to_lowercase(),
            })
            .filter(|rule| {
                if rule.from.is_empty() {
                    return false;
                }
                if rule.from.chars().all(is_key_char) {
                    log::warn!(
                        "Ignoring fold rule '{}' -> '{}': source is already a key",
                        rule.from,
                        rule.to
                    );
                    return false;
                }
                true
            })
            .collect();

        folding.sort_by(|a, b| b.from.chars().count().cmp(&a.from.chars().count()));

        Self { folding }
    }

    /// Normalizes a raw string into a lookup key. Total: never fails,
    /// possibly returns an empty string.
    ///
    /// Any Unicode whitespace (tab, newline, no-break space) separates
    /// words just like a plain space.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> String {
        let mut folded: String = raw
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();
        for rule in &self.folding {
            if folded.contains(rule.from.as_str()) {
                folded = folded.replace(rule.from.as_str(), &rule.to);
            }
        }

        let stripped = DISALLOWED_RE.replace_all(&folded, "");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

const fn is_key_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9' | ' ' | '-')
}

impl Default for Normalizer {
    fn default() -> Self {
        let folding: Vec<FoldRule> = DEFAULT_FOLDING
            .iter()
            .map(|(from, to)| FoldRule {
                from: (*from).to_string(),
                to: (*to).to_string(),
            })
            .collect();
        Self::new(&folding)
    }
}

/// Normalizes with the default Danish folding table.
#[must_use]
pub fn normalize(raw: &str) -> String {
    static DEFAULT: LazyLock<Normalizer> = LazyLock::new(Normalizer::default);
    DEFAULT.normalize(raw)
}
