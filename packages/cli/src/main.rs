#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for resolving Danish city names to postal codes.

mod csv_io;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use city_zip_cli_utils::ResolutionBar;
use city_zip_database::{import, paths, reference_db};
use city_zip_location::LocationConfig;
use city_zip_location::batch::resolve_batch;
use city_zip_location::config::load_or_default;
use city_zip_location::extract::CityExtractor;
use city_zip_location::normalize::Normalizer;
use city_zip_location::reference::ReferenceBuilder;
use city_zip_location::resolve::Resolver;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "city_zip", about = "Danish city name to postal code resolution")]
struct Cli {
    /// Alternative rule set (TOML). Defaults to the embedded Danish rules.
    #[arg(long, global = true, env = "CITY_ZIP_CONFIG")]
    config: Option<PathBuf>,
    /// Reference `DuckDB` file. Defaults to `data/reference.duckdb`.
    #[arg(long, global = true, env = "CITY_ZIP_DB")]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the lookup key for a city name
    Normalize {
        /// Raw city name
        text: String,
    },
    /// Print the city (and postal code prefix) extracted from a location
    Extract {
        /// Free-form location string (e.g. "2100 København Ø")
        location: String,
    },
    /// Resolve a location to its best postal code and print the result as JSON
    Resolve {
        /// Free-form location string, or a bare city with `--city`
        location: String,
        /// Postal code known from a related entity
        #[arg(long)]
        context: Option<String>,
        /// Treat the input as an already extracted city name
        #[arg(long)]
        city: bool,
    },
    /// Import postal code (and alias) CSV files, replacing existing data
    Import {
        /// CSV with `postal_code,city[,latitude,longitude]`
        #[arg(long)]
        postal: PathBuf,
        /// CSV with `alias,city`
        #[arg(long)]
        aliases: Option<PathBuf>,
    },
    /// Resolve every row of a CSV file
    Batch {
        /// CSV with `id,location[,context]`
        #[arg(long)]
        input: PathBuf,
        /// Output CSV path
        #[arg(long)]
        output: PathBuf,
        /// Number of worker tasks (defaults to available parallelism)
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Print how much reference data is stored
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = city_zip_cli_utils::init_logger("info");
    let cli = Cli::parse();

    let config = load_or_default(cli.config.as_deref())?;
    let db_path = cli.db.unwrap_or_else(paths::reference_db_path);

    match cli.command {
        Commands::Normalize { text } => {
            println!("{}", Normalizer::new(&config.normalize.folding).normalize(&text));
        }
        Commands::Extract { location } => {
            let extractor = CityExtractor::new(&config.extract)?;
            match extractor.extract(Some(&location)) {
                Some(extracted) => match extracted.postal_code {
                    Some(code) => println!("{} ({code})", extracted.city),
                    None => println!("{}", extracted.city),
                },
                None => println!("(none)"),
            }
        }
        Commands::Resolve {
            location,
            context,
            city,
        } => {
            let store = reference_db::DuckDbStore::new(reference_db::open(&db_path)?);
            let resolver = Resolver::new(&config, store)?;

            let result = if city {
                Some(resolver.resolve(&location, context.as_deref())?)
            } else {
                resolver.resolve_location(&location, context.as_deref())?
            };

            match result {
                Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                None => println!("(none)"),
            }
        }
        Commands::Import { postal, aliases } => {
            run_import(&config, &db_path, &postal, aliases.as_deref())?;
        }
        Commands::Batch {
            input,
            output,
            workers,
        } => {
            let start = Instant::now();

            let queries = csv_io::read_queries(&input)?;
            let snapshot = reference_db::load_snapshot(&reference_db::open(&db_path)?)?;
            if snapshot.record_count() == 0 {
                log::warn!(
                    "Reference database {} is empty; run `import` first",
                    db_path.display()
                );
            }
            let resolver = Arc::new(Resolver::new(&config, snapshot)?);

            let workers = workers.unwrap_or_else(|| {
                std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
            });
            let progress = ResolutionBar::attach(&multi);
            let report = resolve_batch(resolver, queries, workers, progress).await?;

            csv_io::write_results(&output, &report.items)?;

            let stats = report.stats;
            log::info!(
                "Batch done in {:.1}s: {} total, {} resolved, {} unresolved, {} rejected, {} via alias, {} via context",
                start.elapsed().as_secs_f64(),
                stats.total,
                stats.resolved,
                stats.unresolved,
                stats.rejected,
                stats.via_alias,
                stats.via_context,
            );
            log::info!("Wrote {}", output.display());
        }
        Commands::Stats => {
            let counts = reference_db::counts(&reference_db::open(&db_path)?)?;
            println!("{:<14} {}", "postal codes", counts.postal_codes);
            println!("{:<14} {}", "cities", counts.cities);
            println!("{:<14} {}", "aliases", counts.aliases);
        }
    }

    Ok(())
}

fn run_import(
    config: &LocationConfig,
    db_path: &Path,
    postal: &Path,
    aliases: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let builder = ReferenceBuilder::new(config)?;
    let conn = reference_db::open(db_path)?;

    log::info!("Importing postal codes from {}", postal.display());
    let records = import::parse_postal_csv(File::open(postal)?, &builder)?;
    let stored = reference_db::replace_postal_records(&conn, &records)?;

    let mut alias_count = 0;
    if let Some(path) = aliases {
        log::info!("Importing aliases from {}", path.display());
        let parsed = import::parse_alias_csv(File::open(path)?, &builder)?;
        alias_count = reference_db::replace_aliases(&conn, &parsed)?;
    }

    log::info!(
        "Imported {stored} postal codes and {alias_count} aliases into {}",
        db_path.display()
    );
    Ok(())
}
