//! Command-line entry point for the catalog pipeline.
//!
//! Reads an acquisition feed (`mainCategory -> subCategory -> [listing]`) and
//! either writes the normalized or grouped form as JSON, or synchronizes it
//! into a persisted catalog.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use catalog_sync::config::Config;
use catalog_sync::pipeline::CollectionStatus;
use catalog_sync::{
    group_by_collection, Catalog, CatalogError, CanonicalProduct, ListingFeed, MemoryStore,
    NormalizedListing, Pipeline, PostgresStore, SqliteStore, Vocabulary,
};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Normalize, group and synchronize multi-store product listings")]
struct Cli {
    /// Directory holding type.json, firm.json, flavor.json and variety.json
    #[arg(long, global = true)]
    vocabulary_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize every listing and write them re-nested by category
    Normalize {
        input: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Normalize and group listings into canonical products per collection
    Group {
        input: PathBuf,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Run the full pipeline against the catalog store
    Sync {
        input: PathBuf,

        /// Overrides DATABASE_URL (`postgres://..`, `sqlite:..` or `memory:`)
        #[arg(long)]
        database_url: Option<String>,

        /// Overrides SYNC_WRITE_CONCURRENCY
        #[arg(long)]
        write_concurrency: Option<usize>,

        /// Overrides SYNC_MAX_ATTEMPTS
        #[arg(long)]
        max_attempts: Option<u32>,

        #[arg(long, default_value_t = 4)]
        collection_concurrency: usize,
    },
}

#[derive(Serialize)]
struct NormalizeOutput {
    listings: IndexMap<String, IndexMap<String, Vec<NormalizedListing>>>,
    failed: usize,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr; stdout carries JSON output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,catalog_sync=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(dir) = cli.vocabulary_dir {
        config.vocabulary_dir = dir;
    }

    match cli.command {
        Commands::Normalize { input, output } => cmd_normalize(&config, &input, output.as_deref()),
        Commands::Group { input, output } => cmd_group(&config, &input, output.as_deref()),
        Commands::Sync {
            input,
            database_url,
            write_concurrency,
            max_attempts,
            collection_concurrency,
        } => {
            if let Some(url) = database_url {
                config.database_url = Some(url);
            }
            if let Some(n) = write_concurrency {
                config.write_concurrency = n;
            }
            if let Some(n) = max_attempts {
                config.max_attempts = n;
            }
            cmd_sync(&config, &input, collection_concurrency).await
        }
    }
}

fn load_inputs(config: &Config, input: &Path) -> Result<(Vocabulary, ListingFeed)> {
    let vocabulary = Vocabulary::load_dir(&config.vocabulary_dir)
        .map_err(CatalogError::from)
        .context("Failed to load vocabulary")?;

    let json = fs::read_to_string(input).map_err(|source| CatalogError::Io {
        path: input.to_path_buf(),
        source,
    })?;
    let feed = ListingFeed::from_json_str(&json)
        .map_err(CatalogError::Feed)
        .with_context(|| format!("Failed to parse {}", input.display()))?;

    tracing::info!("Loaded {} listings from {}", feed.len(), input.display());
    Ok((vocabulary, feed))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn normalize_feed(config: &Config, input: &Path) -> Result<(Vec<NormalizedListing>, usize)> {
    let (vocabulary, feed) = load_inputs(config, input)?;
    let pipeline = Pipeline::new(MemoryStore::new(), vocabulary);

    let mut listings = Vec::new();
    let mut failed = 0;
    for (_, batch) in pipeline.normalize(&feed) {
        failed += batch.failures.len();
        listings.extend(batch.listings);
    }
    Ok((listings, failed))
}

fn cmd_normalize(config: &Config, input: &Path, output: Option<&Path>) -> Result<ExitCode> {
    let (listings, failed) = normalize_feed(config, input)?;

    let mut nested: IndexMap<String, IndexMap<String, Vec<NormalizedListing>>> = IndexMap::new();
    for listing in listings {
        nested
            .entry(listing.main_category.clone())
            .or_default()
            .entry(listing.sub_category.clone())
            .or_default()
            .push(listing);
    }

    write_json(&NormalizeOutput { listings: nested, failed }, output)?;
    Ok(ExitCode::SUCCESS)
}

fn cmd_group(config: &Config, input: &Path, output: Option<&Path>) -> Result<ExitCode> {
    let (listings, _) = normalize_feed(config, input)?;

    let catalog: IndexMap<String, Vec<CanonicalProduct>> = group_by_collection(&listings)
        .into_iter()
        .map(|group| (group.collection, group.products))
        .collect();

    write_json(&catalog, output)?;
    Ok(ExitCode::SUCCESS)
}

async fn cmd_sync(config: &Config, input: &Path, collection_concurrency: usize) -> Result<ExitCode> {
    let (vocabulary, feed) = load_inputs(config, input)?;
    let url = config.require_database_url()?;

    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        let store = PostgresStore::new(url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        run_pipeline(store, vocabulary, config, collection_concurrency, &feed).await
    } else if url.starts_with("sqlite:") {
        let store = SqliteStore::new(url)
            .await
            .context("Failed to open SQLite database")?;
        run_pipeline(store, vocabulary, config, collection_concurrency, &feed).await
    } else if url == "memory:" {
        run_pipeline(MemoryStore::new(), vocabulary, config, collection_concurrency, &feed).await
    } else {
        bail!("Unsupported DATABASE_URL scheme: {}", url);
    }
}

async fn run_pipeline<S: Catalog>(
    store: S,
    vocabulary: Vocabulary,
    config: &Config,
    collection_concurrency: usize,
    feed: &ListingFeed,
) -> Result<ExitCode> {
    let pipeline = Pipeline::new(store, vocabulary).with_config(
        config
            .pipeline_config()
            .with_collection_concurrency(collection_concurrency),
    );
    let report = pipeline.run(feed).await.context("Pipeline run failed")?;

    for collection in &report.collections {
        match collection.status {
            CollectionStatus::Failed => tracing::error!(
                "{}: failed after {} writes: {}",
                collection.collection,
                collection.sync.written(),
                collection.error.as_deref().unwrap_or("unknown error")
            ),
            _ => tracing::info!(
                "{}: {:?}, {} listings ({} failed), {} inserted, {} updated, {} deleted",
                collection.collection,
                collection.status,
                collection.listings_total,
                collection.failed,
                collection.sync.inserted,
                collection.sync.updated,
                collection.sync.deleted
            ),
        }
    }

    write_json(&report, None)?;
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
