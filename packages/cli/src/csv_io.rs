//! CSV input and output for the `batch` command.

use std::path::Path;

use city_zip_location::batch::{BatchItem, LocationQuery};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct InputRow {
    id: String,
    location: String,
    #[serde(default)]
    context: Option<String>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    id: &'a str,
    location: &'a str,
    city: Option<&'a str>,
    postal_code: Option<&'a str>,
    used_alias: bool,
    used_context: bool,
}

impl<'a> From<&'a BatchItem> for OutputRow<'a> {
    fn from(item: &'a BatchItem) -> Self {
        let result = item.result.as_ref();
        Self {
            id: &item.id,
            location: &item.location,
            city: result.and_then(|r| r.resolved_city.as_deref()),
            postal_code: result.and_then(|r| r.best_code.as_deref()),
            used_alias: result.is_some_and(|r| r.used_alias),
            used_context: result.is_some_and(|r| r.used_context),
        }
    }
}

/// Reads `id,location[,context]` rows. Malformed rows are skipped.
pub fn read_queries(path: &Path) -> Result<Vec<LocationQuery>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut queries = Vec::new();
    for result in reader.deserialize::<InputRow>() {
        match result {
            Ok(row) => queries.push(LocationQuery {
                id: row.id,
                location: row.location,
                context: row.context.filter(|c| !c.is_empty()),
            }),
            Err(e) => log::warn!("Skipping malformed input row: {e}"),
        }
    }

    log::info!("Read {} queries from {}", queries.len(), path.display());
    Ok(queries)
}

/// Writes one `id,location,city,postal_code,used_alias,used_context` row per
/// item.
pub fn write_results(path: &Path, items: &[BatchItem]) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    for item in items {
        writer.serialize(OutputRow::from(item))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use city_zip_location_models::ResolutionResult;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("city_zip_{}_{name}", std::process::id()))
    }

    #[test]
    fn reads_optional_context() {
        let path = temp_path("input.csv");
        std::fs::write(
            &path,
            "id,location,context\n1,Aarhus C,8200\n2,\"København Ø, Danmark\",\n3,Odense\n",
        )
        .unwrap();

        let queries = read_queries(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0].context.as_deref(), Some("8200"));
        assert_eq!(queries[1].location, "København Ø, Danmark");
        assert_eq!(queries[1].context, None);
        assert_eq!(queries[2].context, None);
    }

    #[test]
    fn writes_resolved_and_unresolved_rows() {
        let path = temp_path("output.csv");
        let items = vec![
            BatchItem {
                id: "1".to_string(),
                location: "KBH".to_string(),
                result: Some(ResolutionResult {
                    input: "KBH".to_string(),
                    normalized: "kobenhavn".to_string(),
                    resolved_city: Some("København K".to_string()),
                    candidate_codes: vec!["1050".to_string(), "2100".to_string()],
                    best_code: Some("1050".to_string()),
                    used_alias: true,
                    used_context: false,
                }),
            },
            BatchItem {
                id: "2".to_string(),
                location: "Stockholm, Sverige".to_string(),
                result: None,
            },
        ];

        write_results(&path, &items).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            written,
            "id,location,city,postal_code,used_alias,used_context\n\
             1,KBH,København K,1050,true,false\n\
             2,\"Stockholm, Sverige\",,,false,false\n"
        );
    }
}
