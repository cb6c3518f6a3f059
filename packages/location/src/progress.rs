//! Per-query progress reporting for batch resolution.
//!
//! Workers report the outcome class of every finished query, so a
//! front end can show running resolved/unresolved/rejected counts
//! without waiting for the merged [`BatchStats`].

use std::sync::Arc;

use city_zip_location_models::{BatchStats, ResolutionResult};

/// How a single query ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A postal code was chosen.
    Resolved,
    /// A city was extracted but has no reference candidates.
    Unresolved,
    /// Nothing could be extracted (empty or foreign location).
    Rejected,
}

impl Outcome {
    /// Classifies a [`crate::resolve::Resolver::resolve_location`] result.
    #[must_use]
    pub fn of(result: Option<&ResolutionResult>) -> Self {
        match result {
            None => Self::Rejected,
            Some(r) if r.is_resolved() => Self::Resolved,
            Some(_) => Self::Unresolved,
        }
    }
}

/// Receives batch progress. Called concurrently from blocking workers.
pub trait BatchProgress: Send + Sync {
    /// The batch has `total` queries.
    fn start(&self, total: u64);

    /// One query finished.
    fn record(&self, outcome: Outcome);

    /// All workers finished; `stats` are the merged counters.
    fn finish(&self, stats: &BatchStats);
}

/// Discards all progress.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn start(&self, _total: u64) {}
    fn record(&self, _outcome: Outcome) {}
    fn finish(&self, _stats: &BatchStats) {}
}

#[must_use]
pub fn silent() -> Arc<dyn BatchProgress> {
    Arc::new(SilentProgress)
}
