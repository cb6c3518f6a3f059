//! Parallel resolution of many locations against one reference snapshot.
//!
//! Each query is independent, so the batch is split into contiguous
//! chunks that run on tokio's blocking thread pool. Every worker keeps its
//! own [`BatchStats`] and the accumulators are merged once all workers
//! finish. Output order equals input order.

use std::sync::Arc;

use city_zip_location_models::{BatchStats, ResolutionResult};

use crate::LocationError;
use crate::progress::{BatchProgress, Outcome};
use crate::resolve::Resolver;
use crate::store::{ReferenceStore, StoreError};

/// One location to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationQuery {
    /// Caller's identifier (job id, company id, ...).
    pub id: String,
    /// Free-form location string.
    pub location: String,
    /// Optional postal code known from a related entity.
    pub context: Option<String>,
}

/// The outcome for one [`LocationQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    /// The query's identifier.
    pub id: String,
    /// The query's raw location.
    pub location: String,
    /// `None` when no city could be extracted.
    pub result: Option<ResolutionResult>,
}

/// All outcomes plus merged counters.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Outcomes in input order.
    pub items: Vec<BatchItem>,
    /// Merged counters from every worker.
    pub stats: BatchStats,
}

/// Resolves `queries` with up to `workers` blocking tasks.
///
/// # Errors
///
/// Returns [`LocationError::Store`] if the reference store fails for any
/// query, or [`LocationError::Join`] if a worker panics.
pub async fn resolve_batch<S: ReferenceStore + 'static>(
    resolver: Arc<Resolver<S>>,
    queries: Vec<LocationQuery>,
    workers: usize,
    progress: Arc<dyn BatchProgress>,
) -> Result<BatchReport, LocationError> {
    if queries.is_empty() {
        return Ok(BatchReport::default());
    }

    let total = queries.len();
    let workers = workers.clamp(1, total);
    let chunk_size = total.div_ceil(workers);

    log::info!("Resolving {total} locations with {workers} workers (chunk size {chunk_size})");
    progress.start(total as u64);

    let mut chunks: Vec<Vec<LocationQuery>> = Vec::with_capacity(workers);
    let mut iter = queries.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(chunk_size).collect());
    }

    let handles = chunks.into_iter().map(|chunk| {
        let resolver = Arc::clone(&resolver);
        let progress = Arc::clone(&progress);
        tokio::task::spawn_blocking(move || resolve_chunk(&resolver, chunk, progress.as_ref()))
    });

    let outcomes = futures::future::try_join_all(handles).await?;

    let mut report = BatchReport {
        items: Vec::with_capacity(total),
        stats: BatchStats::default(),
    };
    for outcome in outcomes {
        let (items, stats) = outcome?;
        report.items.extend(items);
        report.stats.merge(&stats);
    }

    progress.finish(&report.stats);

    Ok(report)
}

fn resolve_chunk<S: ReferenceStore>(
    resolver: &Resolver<S>,
    chunk: Vec<LocationQuery>,
    progress: &dyn BatchProgress,
) -> Result<(Vec<BatchItem>, BatchStats), StoreError> {
    let mut stats = BatchStats::default();
    let mut items = Vec::with_capacity(chunk.len());

    for query in chunk {
        let result = resolver.resolve_location(&query.location, query.context.as_deref())?;
        stats.record(result.as_ref());
        progress.record(Outcome::of(result.as_ref()));
        items.push(BatchItem {
            id: query.id,
            location: query.location,
            result,
        });
    }

    Ok((items, stats))
}
