//! Loading of [`LocationConfig`].
//!
//! The default Danish rule set in `config/default.toml` is baked into the
//! binary at compile time. Alternative rule sets are plain TOML files
//! with the same shape.

use std::path::Path;

use city_zip_location_models::LocationConfig;

use crate::LocationError;

/// The embedded default configuration.
const DEFAULT_CONFIG_TOML: &str = include_str!("../config/default.toml");

/// Parses a configuration document.
///
/// # Errors
///
/// Returns [`LocationError::Config`] if the TOML is malformed or has the
/// wrong shape.
pub fn parse_config(toml_str: &str) -> Result<LocationConfig, LocationError> {
    toml::de::from_str(toml_str).map_err(|e| LocationError::Config(e.to_string()))
}

/// Reads and parses a configuration file.
///
/// # Errors
///
/// Returns [`LocationError::Io`] if the file cannot be read, or
/// [`LocationError::Config`] if it does not parse.
pub fn load_config(path: &Path) -> Result<LocationConfig, LocationError> {
    log::info!("Loading location config from {}", path.display());
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Returns the embedded default configuration.
///
/// # Panics
///
/// Panics if the embedded TOML is malformed (a build-time guarantee,
/// covered by tests).
#[must_use]
pub fn default_config() -> LocationConfig {
    parse_config(DEFAULT_CONFIG_TOML)
        .unwrap_or_else(|e| panic!("Failed to parse embedded default.toml: {e}"))
}

/// Loads `path` if given, otherwise the embedded default.
///
/// # Errors
///
/// Propagates errors from [`load_config`].
pub fn load_or_default(path: Option<&Path>) -> Result<LocationConfig, LocationError> {
    path.map_or_else(|| Ok(default_config()), load_config)
}
