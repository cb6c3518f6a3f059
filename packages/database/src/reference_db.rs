//! Postal code reference data stored in `DuckDB`.
//!
//! Two tables: `postal_codes` (one row per code, keyed by the normalized
//! city) and `city_aliases`. Imports replace a table's contents inside a
//! single transaction, so readers see either the old or the new data.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use city_zip_location::store::{ReferenceSnapshot, ReferenceStore, StoreError};
use city_zip_location_models::{CityAlias, PostalRecord};
use duckdb::Connection;

use crate::DbError;

/// Opens (or creates) the reference `DuckDB`.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    log::debug!("Opening reference database at {}", path.display());
    let conn = Connection::open(path)?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Opens a throwaway in-memory reference database.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS postal_codes (
            postal_code TEXT PRIMARY KEY,
            canonical_city TEXT NOT NULL,
            normalized_city TEXT NOT NULL,
            weight INTEGER NOT NULL,
            latitude DOUBLE,
            longitude DOUBLE
        );
        CREATE INDEX IF NOT EXISTS idx_postal_codes_city
            ON postal_codes (normalized_city);
        CREATE TABLE IF NOT EXISTS city_aliases (
            alias TEXT PRIMARY KEY,
            normalized_city TEXT NOT NULL
        );",
    )?;
    Ok(())
}

/// Runs `body` inside a transaction, rolling back if it fails.
fn in_transaction<T>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> Result<T, DbError>,
) -> Result<T, DbError> {
    conn.execute_batch("BEGIN TRANSACTION")?;
    match body(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                log::warn!("Rollback failed: {rollback}");
            }
            Err(e)
        }
    }
}

/// Replaces all postal code records.
///
/// A code that appears more than once keeps its last occurrence. Returns
/// the number of stored records.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails; the previous contents are
/// kept in that case.
pub fn replace_postal_records(conn: &Connection, records: &[PostalRecord]) -> Result<u64, DbError> {
    in_transaction(conn, |conn| {
        conn.execute_batch("DELETE FROM postal_codes")?;

        let mut latest: BTreeMap<&str, &PostalRecord> = BTreeMap::new();
        for r in records {
            if latest.insert(r.postal_code.as_str(), r).is_some() {
                log::warn!(
                    "Duplicate postal code {} in import; keeping the last row",
                    r.postal_code
                );
            }
        }

        let mut stmt = conn.prepare(
            "INSERT INTO postal_codes
                (postal_code, canonical_city, normalized_city, weight, latitude, longitude)
             VALUES (?, ?, ?, ?, ?, ?)",
        )?;

        for r in latest.values() {
            stmt.execute(duckdb::params![
                r.postal_code,
                r.canonical_city,
                r.normalized_city,
                r.weight,
                r.latitude,
                r.longitude,
            ])?;
        }

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM postal_codes", [], |row| {
            row.get(0)
        })?;
        u64::try_from(count).map_err(|e| DbError::Conversion {
            message: format!("negative row count {count}: {e}"),
        })
    })
    .inspect(|count| log::info!("Stored {count} postal code records"))
}

/// Replaces all aliases. Aliases pointing at themselves are not stored.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails; the previous contents are
/// kept in that case.
pub fn replace_aliases(conn: &Connection, aliases: &[CityAlias]) -> Result<u64, DbError> {
    in_transaction(conn, |conn| {
        conn.execute_batch("DELETE FROM city_aliases")?;

        let mut latest: BTreeMap<&str, &str> = BTreeMap::new();
        for a in aliases {
            if a.alias == a.normalized_city {
                log::warn!("Skipping self-referencing alias '{}'", a.alias);
                continue;
            }
            latest.insert(&a.alias, &a.normalized_city);
        }

        let mut stmt =
            conn.prepare("INSERT INTO city_aliases (alias, normalized_city) VALUES (?, ?)")?;
        for (alias, target) in &latest {
            stmt.execute(duckdb::params![alias, target])?;
        }
        Ok(latest.len() as u64)
    })
    .inspect(|count| log::info!("Stored {count} aliases"))
}

fn row_to_record(row: &duckdb::Row<'_>) -> duckdb::Result<PostalRecord> {
    Ok(PostalRecord {
        postal_code: row.get(0)?,
        canonical_city: row.get(1)?,
        normalized_city: row.get(2)?,
        weight: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
    })
}

const RECORD_COLUMNS: &str =
    "postal_code, canonical_city, normalized_city, weight, latitude, longitude";

/// Loads every record and alias into an in-memory snapshot.
///
/// Records are ordered by postal code.
///
/// # Errors
///
/// Returns [`DbError`] if a query fails.
pub fn load_snapshot(conn: &Connection) -> Result<ReferenceSnapshot, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM postal_codes ORDER BY postal_code"
    ))?;
    let records = stmt
        .query_map([], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT alias, normalized_city FROM city_aliases ORDER BY alias")?;
    let aliases = stmt
        .query_map([], |row| {
            Ok(CityAlias {
                alias: row.get(0)?,
                normalized_city: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let snapshot = ReferenceSnapshot::new(records, &aliases);
    log::info!(
        "Loaded reference snapshot: {} records, {} cities, {} aliases",
        snapshot.record_count(),
        snapshot.city_count(),
        snapshot.alias_count()
    );

    Ok(snapshot)
}

/// Row counts of the reference tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceCounts {
    /// Number of postal code records.
    pub postal_codes: u64,
    /// Number of distinct normalized cities.
    pub cities: u64,
    /// Number of aliases.
    pub aliases: u64,
}

/// Reports how much reference data is stored.
///
/// # Errors
///
/// Returns [`DbError`] if a query fails.
pub fn counts(conn: &Connection) -> Result<ReferenceCounts, DbError> {
    let (postal_codes, cities): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT normalized_city) FROM postal_codes",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let aliases: i64 = conn.query_row("SELECT COUNT(*) FROM city_aliases", [], |row| row.get(0))?;

    let convert = |n: i64| {
        u64::try_from(n).map_err(|e| DbError::Conversion {
            message: format!("negative row count {n}: {e}"),
        })
    };

    Ok(ReferenceCounts {
        postal_codes: convert(postal_codes)?,
        cities: convert(cities)?,
        aliases: convert(aliases)?,
    })
}

/// A [`ReferenceStore`] that queries `DuckDB` on every lookup.
///
/// `duckdb::Connection` is `Send` but not `Sync`, so the connection is
/// wrapped in a `Mutex`.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Wraps an open connection.
    #[must_use]
    pub const fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> duckdb::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("DuckDB connection mutex poisoned".to_string()))?;
        f(&conn).map_err(|e| StoreError::Backend {
            message: e.to_string(),
        })
    }
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore").finish_non_exhaustive()
    }
}

impl ReferenceStore for DuckDbStore {
    fn find_by_normalized_city(&self, normalized: &str) -> Result<Vec<PostalRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM postal_codes
                 WHERE normalized_city = ? ORDER BY postal_code"
            ))?;
            let records = stmt
                .query_map(duckdb::params![normalized], row_to_record)?
                .collect::<duckdb::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    fn find_alias(&self, normalized: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            match conn.query_row(
                "SELECT normalized_city FROM city_aliases WHERE alias = ?",
                duckdb::params![normalized],
                |row| row.get(0),
            ) {
                Ok(target) => Ok(Some(target)),
                Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use city_zip_location::config::default_config;
    use city_zip_location::resolve::Resolver;

    fn record(code: &str, city: &str, key: &str, weight: i32) -> PostalRecord {
        PostalRecord {
            postal_code: code.to_string(),
            canonical_city: city.to_string(),
            normalized_city: key.to_string(),
            weight,
            latitude: None,
            longitude: None,
        }
    }

    fn alias(alias: &str, city: &str) -> CityAlias {
        CityAlias {
            alias: alias.to_string(),
            normalized_city: city.to_string(),
        }
    }

    fn seeded() -> Connection {
        let conn = open_in_memory().unwrap();
        replace_postal_records(
            &conn,
            &[
                record("2100", "København Ø", "kobenhavn", 50),
                record("1050", "København K", "kobenhavn", 100),
                record("8000", "Aarhus C", "aarhus", 100),
            ],
        )
        .unwrap();
        replace_aliases(&conn, &[alias("kbh", "kobenhavn")]).unwrap();
        conn
    }

    #[test]
    fn replace_is_idempotent() {
        let conn = seeded();
        let stored = replace_postal_records(
            &conn,
            &[
                record("8000", "Aarhus C", "aarhus", 100),
                record("8200", "Aarhus N", "aarhus", 50),
            ],
        )
        .unwrap();
        assert_eq!(stored, 2);

        let counts = counts(&conn).unwrap();
        assert_eq!(
            counts,
            ReferenceCounts {
                postal_codes: 2,
                cities: 1,
                aliases: 1,
            }
        );
    }

    #[test]
    fn duplicate_code_keeps_last_occurrence() {
        let conn = open_in_memory().unwrap();
        let stored = replace_postal_records(
            &conn,
            &[
                record("5000", "Odense", "odense", 10),
                record("5000", "Odense C", "odense", 100),
            ],
        )
        .unwrap();
        assert_eq!(stored, 1);

        let store = DuckDbStore::new(conn);
        let found = store.find_by_normalized_city("odense").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].canonical_city, "Odense C");
        assert_eq!(found[0].weight, 100);
    }

    #[test]
    fn self_aliases_are_not_stored() {
        let conn = open_in_memory().unwrap();
        let stored =
            replace_aliases(&conn, &[alias("aarhus", "aarhus"), alias("aros", "aarhus")]).unwrap();
        assert_eq!(stored, 1);
        assert_eq!(counts(&conn).unwrap().aliases, 1);
    }

    #[test]
    fn snapshot_is_ordered_by_postal_code() {
        let snapshot = load_snapshot(&seeded()).unwrap();
        assert_eq!(snapshot.record_count(), 3);
        assert_eq!(snapshot.city_count(), 2);
        assert_eq!(snapshot.alias_count(), 1);

        let codes: Vec<String> = snapshot
            .find_by_normalized_city("kobenhavn")
            .unwrap()
            .into_iter()
            .map(|r| r.postal_code)
            .collect();
        assert_eq!(codes, vec!["1050", "2100"]);
    }

    #[test]
    fn direct_store_answers_lookups() {
        let store = DuckDbStore::new(seeded());

        assert_eq!(store.find_alias("kbh").unwrap().as_deref(), Some("kobenhavn"));
        assert_eq!(store.find_alias("aros").unwrap(), None);
        assert!(store.find_by_normalized_city("odense").unwrap().is_empty());

        let aarhus = store.find_by_normalized_city("aarhus").unwrap();
        assert_eq!(aarhus.len(), 1);
        assert_eq!(aarhus[0].canonical_city, "Aarhus C");
    }

    #[test]
    fn snapshot_and_direct_store_resolve_alike() {
        let config = default_config();
        let via_snapshot = Resolver::new(&config, load_snapshot(&seeded()).unwrap()).unwrap();
        let via_db = Resolver::new(&config, DuckDbStore::new(seeded())).unwrap();

        for input in ["KBH", "København", "Aarhus", "Odense"] {
            assert_eq!(
                via_snapshot.resolve(input, None).unwrap(),
                via_db.resolve(input, None).unwrap(),
                "{input}"
            );
        }

        let result = via_db.resolve("KBH", None).unwrap();
        assert!(result.used_alias);
        assert_eq!(result.best_code.as_deref(), Some("1050"));
        assert_eq!(result.candidate_codes, vec!["1050", "2100"]);
    }

    #[test]
    fn missing_tables_surface_as_backend_errors() {
        let conn = Connection::open_in_memory().unwrap();
        let store = DuckDbStore::new(conn);
        assert!(matches!(
            store.find_alias("kbh"),
            Err(StoreError::Backend { .. })
        ));
    }
}
