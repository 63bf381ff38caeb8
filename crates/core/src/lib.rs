//! Core types and shared functionality for chordium.
//!
//! This crate provides:
//! - Chord sheet and song models, and the cache key codec
//! - The SQLite-backed chord sheet repository and legacy flat storage
//! - The two-tier unified chord sheet cache
//! - The legacy storage migration service
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod migration;
pub mod models;
pub mod repository;
pub mod unified;

pub use cache::{CacheDb, keys};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use migration::{CleanupReport, MigrationResult, MigrationService};
pub use models::{CachedSong, ChordSheet, ChordSheetRecord, Song};
pub use repository::{ChordSheetRepository, LegacyStorage};
pub use unified::{CacheOptions, CacheStats, UnifiedCacheConfig, UnifiedChordSheetCache};
