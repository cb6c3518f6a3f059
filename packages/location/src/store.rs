//! Read-only reference data access.
//!
//! The engine needs exactly two lookups: postal records by normalized
//! city, and alias resolution. [`ReferenceStore`] abstracts over where
//! they come from. [`ReferenceSnapshot`] is the immutable in-memory
//! implementation and [`SharedSnapshot`] lets a refresh swap in a new
//! snapshot atomically while resolutions are running.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use city_zip_location_models::{CityAlias, PostalRecord};

/// Infrastructure failure of a reference store.
///
/// Distinct from "no result": a city with no candidates is an empty
/// `Ok`, never an error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached at all.
    #[error("Reference store unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but the query failed.
    #[error("Reference store query failed: {message}")]
    Backend {
        /// Description of what went wrong.
        message: String,
    },
}

/// Read access to postal records and city aliases.
///
/// Implementations must support concurrent reads.
pub trait ReferenceStore: Send + Sync {
    /// Returns every postal record whose normalized city equals
    /// `normalized`, in the store's natural order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be queried.
    fn find_by_normalized_city(&self, normalized: &str) -> Result<Vec<PostalRecord>, StoreError>;

    /// Returns the normalized city an alias points at, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be queried.
    fn find_alias(&self, normalized: &str) -> Result<Option<String>, StoreError>;
}

impl<T: ReferenceStore + ?Sized> ReferenceStore for Arc<T> {
    fn find_by_normalized_city(&self, normalized: &str) -> Result<Vec<PostalRecord>, StoreError> {
        (**self).find_by_normalized_city(normalized)
    }

    fn find_alias(&self, normalized: &str) -> Result<Option<String>, StoreError> {
        (**self).find_alias(normalized)
    }
}

/// Immutable in-memory reference data, indexed by normalized city and
/// alias.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSnapshot {
    by_city: BTreeMap<String, Vec<PostalRecord>>,
    aliases: BTreeMap<String, String>,
    record_count: usize,
}

impl ReferenceSnapshot {
    /// Builds a snapshot.
    ///
    /// Records keep their input order within a city. A postal code that
    /// appears twice replaces the earlier record in place. Aliases pointing
    /// at themselves are skipped.
    #[must_use]
    pub fn new(records: impl IntoIterator<Item = PostalRecord>, aliases: &[CityAlias]) -> Self {
        let mut ordered: Vec<PostalRecord> = Vec::new();
        let mut position: BTreeMap<String, usize> = BTreeMap::new();

        for record in records {
            if let Some(&idx) = position.get(&record.postal_code) {
                log::warn!(
                    "Duplicate postal code {} in reference data; keeping the later record",
                    record.postal_code
                );
                ordered[idx] = record;
            } else {
                position.insert(record.postal_code.clone(), ordered.len());
                ordered.push(record);
            }
        }

        let record_count = ordered.len();
        let mut by_city: BTreeMap<String, Vec<PostalRecord>> = BTreeMap::new();
        for record in ordered {
            by_city
                .entry(record.normalized_city.clone())
                .or_default()
                .push(record);
        }

        let mut alias_map = BTreeMap::new();
        for alias in aliases {
            if alias.alias == alias.normalized_city {
                log::warn!("Skipping self-referencing alias '{}'", alias.alias);
                continue;
            }
            alias_map.insert(alias.alias.clone(), alias.normalized_city.clone());
        }

        Self {
            by_city,
            aliases: alias_map,
            record_count,
        }
    }

    /// Number of postal records.
    #[must_use]
    pub const fn record_count(&self) -> usize {
        self.record_count
    }

    /// Number of aliases.
    #[must_use]
    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    /// Number of distinct normalized cities.
    #[must_use]
    pub fn city_count(&self) -> usize {
        self.by_city.len()
    }
}

impl ReferenceStore for ReferenceSnapshot {
    fn find_by_normalized_city(&self, normalized: &str) -> Result<Vec<PostalRecord>, StoreError> {
        Ok(self.by_city.get(normalized).cloned().unwrap_or_default())
    }

    fn find_alias(&self, normalized: &str) -> Result<Option<String>, StoreError> {
        Ok(self.aliases.get(normalized).cloned())
    }
}

/// A [`ReferenceSnapshot`] that can be replaced wholesale.
///
/// Each lookup reads whichever snapshot is current at that moment; a
/// [`SharedSnapshot::swap`] never exposes a partially-built snapshot.
#[derive(Debug, Default)]
pub struct SharedSnapshot {
    current: RwLock<Arc<ReferenceSnapshot>>,
}

impl SharedSnapshot {
    /// Wraps an initial snapshot.
    #[must_use]
    pub fn new(snapshot: ReferenceSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Returns the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock was poisoned.
    pub fn current(&self) -> Result<Arc<ReferenceSnapshot>, StoreError> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    /// Replaces the current snapshot, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock was poisoned.
    pub fn swap(&self, snapshot: ReferenceSnapshot) -> Result<Arc<ReferenceSnapshot>, StoreError> {
        let mut guard = self
            .current
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let previous = std::mem::replace(&mut *guard, Arc::new(snapshot));
        drop(guard);

        log::info!("Swapped in new reference snapshot");
        Ok(previous)
    }
}

impl ReferenceStore for SharedSnapshot {
    fn find_by_normalized_city(&self, normalized: &str) -> Result<Vec<PostalRecord>, StoreError> {
        self.current()?.find_by_normalized_city(normalized)
    }

    fn find_alias(&self, normalized: &str) -> Result<Option<String>, StoreError> {
        self.current()?.find_alias(normalized)
    }
}
