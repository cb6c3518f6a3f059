//! CSV import of postal code and alias reference data.
//!
//! Postal code files have a header row and the columns
//! `postal_code,city[,latitude,longitude]`. Alias files have
//! `alias,city`. Rows that cannot be parsed or keyed are skipped with a
//! warning.

use std::io::Read;

use city_zip_location::reference::ReferenceBuilder;
use city_zip_location_models::{CityAlias, PostalRecord};
use serde::Deserialize;

use crate::DbError;

/// One row of a postal code CSV file.
#[derive(Debug, Deserialize)]
struct PostalRow {
    #[serde(alias = "postnr", alias = "zip")]
    postal_code: String,
    #[serde(alias = "by", alias = "name")]
    city: String,
    #[serde(default, alias = "lat")]
    latitude: Option<f64>,
    #[serde(default, alias = "lon", alias = "lng")]
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AliasRow {
    alias: String,
    city: String,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Parses postal code rows into keyed, weighted [`PostalRecord`]s.
///
/// # Errors
///
/// Returns [`DbError::Csv`] if the header row cannot be read. Individual
/// malformed rows are skipped.
pub fn parse_postal_csv(
    reader: impl Read,
    builder: &ReferenceBuilder,
) -> Result<Vec<PostalRecord>, DbError> {
    let mut csv_reader = csv_reader(reader);
    csv_reader.headers()?;

    let mut records = Vec::new();
    let mut skipped = 0u64;

    for result in csv_reader.deserialize::<PostalRow>() {
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping malformed postal code row: {e}");
                skipped += 1;
                continue;
            }
        };

        match builder.record(&row.postal_code, &row.city, row.latitude, row.longitude) {
            Some(record) => records.push(record),
            None => skipped += 1,
        }
    }

    log::info!(
        "Parsed {} postal code records ({skipped} skipped)",
        records.len()
    );

    Ok(records)
}

/// Parses alias rows into keyed [`CityAlias`]es.
///
/// # Errors
///
/// Returns [`DbError::Csv`] if the header row cannot be read.
pub fn parse_alias_csv(
    reader: impl Read,
    builder: &ReferenceBuilder,
) -> Result<Vec<CityAlias>, DbError> {
    let mut csv_reader = csv_reader(reader);
    csv_reader.headers()?;

    let mut aliases = Vec::new();
    for result in csv_reader.deserialize::<AliasRow>() {
        match result {
            Ok(row) => aliases.extend(builder.alias(&row.alias, &row.city)),
            Err(e) => log::warn!("Skipping malformed alias row: {e}"),
        }
    }

    log::info!("Parsed {} aliases", aliases.len());

    Ok(aliases)
}
