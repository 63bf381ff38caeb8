//! SQLite-backed local cache for chord sheets.
//!
//! This module provides a persistent record store using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Normalized (artist, title) keys
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Expiry queries and least-recently-accessed eviction
//! - A flat key/value table holding pre-migration payloads

pub mod chord_sheets;
pub mod connection;
pub mod keys;
pub mod local_storage;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
