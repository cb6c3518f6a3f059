#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal front end for the `city_zip` tools.
//!
//! [`ResolutionBar`] renders batch progress with live
//! resolved/unresolved/rejected counts, and [`init_logger`] routes `log`
//! output through the same [`MultiProgress`] so log lines never tear the
//! bar.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use city_zip_location::BatchStats;
use city_zip_location::progress::{BatchProgress, Outcome};
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

const BAR_TEMPLATE: &str = "{wide_bar:.cyan/dim} {pos}/{len} [{eta}] {msg}";

/// Batch progress bar with running outcome counts.
pub struct ResolutionBar {
    bar: ProgressBar,
    resolved: AtomicU64,
    unresolved: AtomicU64,
    rejected: AtomicU64,
}

impl ResolutionBar {
    /// Adds a bar to `multi`.
    #[must_use]
    pub fn attach(multi: &MultiProgress) -> Arc<dyn BatchProgress> {
        Arc::new(Self::new(multi.add(ProgressBar::new(0))))
    }

    fn new(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self {
            bar,
            resolved: AtomicU64::new(0),
            unresolved: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    fn counts_message(&self) -> String {
        outcome_message(
            self.resolved.load(Ordering::Relaxed),
            self.unresolved.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
        )
    }
}

fn outcome_message(resolved: u64, unresolved: u64, rejected: u64) -> String {
    format!("{resolved} resolved, {unresolved} unresolved, {rejected} rejected")
}

impl BatchProgress for ResolutionBar {
    fn start(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_message(self.counts_message());
    }

    fn record(&self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Resolved => &self.resolved,
            Outcome::Unresolved => &self.unresolved,
            Outcome::Rejected => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.bar.set_message(self.counts_message());
        self.bar.inc(1);
    }

    fn finish(&self, stats: &BatchStats) {
        self.bar.finish_with_message(format!(
            "{} ({} via alias, {} via context)",
            outcome_message(stats.resolved, stats.unresolved, stats.rejected),
            stats.via_alias,
            stats.via_context
        ));
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge`.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies (e.g.
/// `"info"`). Returns the [`MultiProgress`] bars must be added to.
#[must_use]
pub fn init_logger(default_filter: &str) -> MultiProgress {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let logger = pretty_env_logger::formatted_builder()
        .parse_filters(&filter)
        .build();
    let level = logger.filter();

    let multi = MultiProgress::new();
    if let Err(e) = indicatif_log_bridge::LogWrapper::new(multi.clone(), logger).try_init() {
        eprintln!("Logger already initialized: {e}");
    }
    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outcomes() {
        let bar = ResolutionBar::new(ProgressBar::hidden());
        bar.start(4);
        bar.record(Outcome::Resolved);
        bar.record(Outcome::Resolved);
        bar.record(Outcome::Rejected);
        bar.record(Outcome::Unresolved);

        assert_eq!(bar.bar.position(), 4);
        assert_eq!(bar.bar.length(), Some(4));
        assert_eq!(
            bar.counts_message(),
            "2 resolved, 1 unresolved, 1 rejected"
        );
    }

    #[test]
    fn finish_reports_merged_stats() {
        let bar = ResolutionBar::new(ProgressBar::hidden());
        bar.finish(&BatchStats {
            total: 5,
            resolved: 3,
            unresolved: 1,
            rejected: 1,
            via_alias: 2,
            via_context: 1,
        });
        assert!(bar.bar.is_finished());
        assert_eq!(
            bar.bar.message(),
            "3 resolved, 1 unresolved, 1 rejected (2 via alias, 1 via context)"
        );
    }
}
