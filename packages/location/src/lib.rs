#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! City name extraction, normalization, and postal code resolution.
//!
//! Turns messy location strings from job postings and scraped company
//! records into a canonical city and a single best postal code.
//!
//! # Architecture
//!
//! - **Extraction**: [`extract::CityExtractor`] strips postal code
//!   prefixes, country markers, municipality and district suffixes.
//! - **Normalization**: [`normalize::Normalizer`] folds case and Danish
//!   characters into a lookup key. The same key is used when reference
//!   data is imported.
//! - **Lookup**: a [`store::ReferenceStore`] answers "which postal codes
//!   belong to this key" and "what does this alias point at".
//! - **Disambiguation**: [`resolve::Resolver`] prefers an exact context
//!   hint, then [`disambiguate::DisambiguationPolicy`] (preferred codes,
//!   weight, lowest code).
//!
//! Every rule table is injected through
//! [`city_zip_location_models::LocationConfig`]; the Danish default is
//! embedded (see [`config::default_config`]).
//!
//! # Usage
//!
//! ```rust
//! use city_zip_location::config::default_config;
//! use city_zip_location::resolve::Resolver;
//! use city_zip_location::store::ReferenceSnapshot;
//! use city_zip_location::PostalRecord;
//!
//! let records = vec![PostalRecord {
//!     postal_code: "8000".to_string(),
//!     canonical_city: "Aarhus C".to_string(),
//!     normalized_city: "aarhus".to_string(),
//!     weight: 100,
//!     latitude: None,
//!     longitude: None,
//! }];
//! let resolver = Resolver::new(&default_config(), ReferenceSnapshot::new(records, &[]))?;
//!
//! let result = resolver.resolve_location("Aarhus C, Danmark", None)?;
//! assert_eq!(result.and_then(|r| r.best_code).as_deref(), Some("8000"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod batch;
pub mod config;
pub mod disambiguate;
pub mod extract;
pub mod normalize;
pub mod progress;
pub mod reference;
pub mod resolve;
pub mod store;
pub mod weights;

pub use city_zip_location_models::{
    BatchStats, CityAlias, LocationConfig, PostalRecord, ResolutionResult,
};
pub use store::StoreError;

/// Errors from building or running the resolution engine.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// A configured pattern is not a valid regular expression.
    #[error("Invalid pattern in '{setting}': {source}")]
    Pattern {
        /// The configuration setting the pattern came from.
        setting: &'static str,
        /// The underlying regex error.
        source: regex::Error,
    },

    /// The reference store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A batch worker task failed to complete.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
