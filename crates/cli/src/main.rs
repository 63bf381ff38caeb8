//! Command-line access to the local chord sheet cache and the legacy migration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chordium_core::migration::LegacyKey;
use chordium_core::{
    AppConfig, CacheDb, CacheOptions, ChordSheet, LegacyStorage, MigrationService, UnifiedCacheConfig,
    UnifiedChordSheetCache,
};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chordium")]
#[command(about = "Local chord sheet cache and legacy storage migration")]
#[command(version)]
struct Cli {
    /// SQLite database path (overrides CHORDIUM_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SongArgs {
    /// Artist name
    artist: String,
    /// Song title
    title: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Move legacy flat-storage chord sheets into the cache
    Migrate,
    /// List (or with --apply, remove) legacy storage keys
    CleanupLegacy {
        /// Remove the keys instead of listing them
        #[arg(long)]
        apply: bool,
    },
    /// Load a raw legacy payload from a file into legacy storage
    ImportLegacy {
        /// Legacy storage key (e.g. chordium-chord-sheet-cache)
        key: String,
        /// File holding the JSON payload
        file: PathBuf,
    },
    /// Cache a chord sheet read from a JSON file
    Cache {
        file: PathBuf,
        /// Store in the saved tier
        #[arg(long)]
        saved: bool,
    },
    /// Print a cached chord sheet
    Show(SongArgs),
    /// Move a cached chord sheet into the saved tier
    Save(SongArgs),
    /// Move a saved chord sheet back into the regular tier
    Unsave(SongArgs),
    /// Remove a chord sheet from the cache
    Remove(SongArgs),
    /// List saved chord sheets
    Saved,
    /// Print cache statistics
    Stats,
    /// Remove expired regular entries, once or on an interval
    Sweep {
        /// Repeat every N seconds until interrupted (defaults to CHORDIUM_SWEEP_INTERVAL_SECS)
        #[arg(long)]
        every: Option<u64>,
        /// Sweep once even if an interval is configured
        #[arg(long, conflicts_with = "every")]
        once: bool,
    },
    /// Remove every cached chord sheet
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path.clone());

    let db = CacheDb::open(&db_path)
        .await
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let result = run(cli.command, &config, &db).await;
    db.close().await.context("failed to close database")?;
    result
}

async fn run(command: Commands, config: &AppConfig, db: &CacheDb) -> Result<()> {
    let repo = Arc::new(db.clone());
    let cache = Arc::new(UnifiedChordSheetCache::new(repo.clone(), UnifiedCacheConfig::from(config)));

    match command {
        Commands::Migrate => {
            let service = MigrationService::new(repo.clone(), repo, *cache.config());
            let result = service.migrate().await;
            print_json(&result)?;
            if !result.success {
                bail!("migration finished with {} error(s)", result.errors.len());
            }
        }
        Commands::CleanupLegacy { apply } => {
            let service = MigrationService::new(repo.clone(), repo, *cache.config());
            print_json(&service.cleanup_local_storage(!apply).await)?;
        }
        Commands::ImportLegacy { key, file } => {
            if LegacyKey::from_key(&key).is_none() {
                let known: Vec<&str> = LegacyKey::ALL.iter().map(|k| k.as_str()).collect();
                bail!("unknown legacy key {key:?}; expected one of {}", known.join(", "));
            }
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            repo.set_item(&key, &raw).await?;
            print_json(&json!({ "key": key, "bytes": raw.len() }))?;
        }
        Commands::Cache { file, saved } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let sheet: ChordSheet =
                serde_json::from_str(&raw).with_context(|| format!("{} is not a chord sheet", file.display()))?;
            let options = if saved { CacheOptions::saved() } else { CacheOptions::default() };
            let cached = cache.cache_chord_sheet(&sheet.artist, &sheet.title, &sheet, options).await;
            print_json(&json!({ "cached": cached }))?;
        }
        Commands::Show(song) => match cache.get_cached_chord_sheet(&song.artist, &song.title).await {
            Some(sheet) => print_json(&sheet)?,
            None => bail!("no cached chord sheet for {} - {}", song.artist, song.title),
        },
        Commands::Save(song) => {
            let updated = cache.set_saved_status(&song.artist, &song.title, true).await;
            print_json(&json!({ "updated": updated }))?;
        }
        Commands::Unsave(song) => {
            let updated = cache.set_saved_status(&song.artist, &song.title, false).await;
            print_json(&json!({ "updated": updated }))?;
        }
        Commands::Remove(song) => {
            let removed = cache.remove_chord_sheet(&song.artist, &song.title).await;
            print_json(&json!({ "removed": removed }))?;
        }
        Commands::Saved => print_json(&cache.get_all_saved_chord_sheets().await)?,
        Commands::Stats => print_json(&cache.get_cache_stats().await)?,
        Commands::Sweep { every, once } => {
            let interval = match every {
                Some(secs) => Some(Duration::from_secs(secs.max(1))),
                None if once => None,
                None => config.sweep_interval(),
            };
            match interval {
                Some(interval) => {
                    let handle = Arc::clone(&cache).spawn_sweeper(interval);
                    tracing::info!(interval_secs = interval.as_secs(), "sweeping until interrupted");
                    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
                    handle.abort();
                }
                None => {
                    let removed = cache.clear_expired_entries().await;
                    print_json(&json!({ "removed": removed }))?;
                }
            }
        }
        Commands::Clear => {
            let removed = cache.clear_all_cache().await;
            print_json(&json!({ "removed": removed }))?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
