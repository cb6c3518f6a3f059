#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` persistence for postal code reference data.
//!
//! Reference data is imported from CSV ([`import`]), stored in a single
//! `DuckDB` file ([`reference_db`]), and served to the resolver either as
//! an in-memory [`city_zip_location::store::ReferenceSnapshot`] or
//! directly through [`reference_db::DuckDbStore`].

pub mod import;
pub mod paths;
pub mod reference_db;

use city_zip_location::LocationError;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// CSV parse error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Building the location engine failed.
    #[error(transparent)]
    Location(#[from] LocationError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
