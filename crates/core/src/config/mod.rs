//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CHORDIUM_*)
//! 2. TOML config file (if CHORDIUM_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CHORDIUM_*)
/// 2. TOML config file (if CHORDIUM_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding chord sheets and legacy storage.
    ///
    /// Set via CHORDIUM_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Listen address for the HTTP server.
    ///
    /// Set via CHORDIUM_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Base URL of the scraping source.
    ///
    /// Set via CHORDIUM_SOURCE_BASE_URL environment variable.
    #[serde(default = "default_source_base_url")]
    pub source_base_url: String,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via CHORDIUM_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    ///
    /// Set via CHORDIUM_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via CHORDIUM_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Lifetime of regular-tier chord sheets, in seconds.
    ///
    /// Set via CHORDIUM_REGULAR_TTL_SECS environment variable.
    #[serde(default = "default_regular_ttl_secs")]
    pub regular_ttl_secs: u64,

    /// Regular-tier capacity before least-recently-accessed eviction.
    ///
    /// Set via CHORDIUM_MAX_REGULAR_ITEMS environment variable.
    #[serde(default = "default_max_regular_items")]
    pub max_regular_items: usize,

    /// Interval of the background expiration sweep, in seconds. 0 disables it.
    ///
    /// Set via CHORDIUM_SWEEP_INTERVAL_SECS environment variable.
    #[serde(default)]
    pub sweep_interval_secs: u64,

    /// Coalesce concurrent cache misses for the same artist.
    ///
    /// Set via CHORDIUM_SINGLE_FLIGHT environment variable.
    #[serde(default)]
    pub single_flight: bool,

    /// Object store connection settings.
    ///
    /// Set via CHORDIUM_OBJECT_STORE__* environment variables.
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
}

/// Object store (S3-compatible) connection settings.
///
/// The store is enabled only when a bucket and both credential halves are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for S3-compatible services (MinIO, R2).
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key_id: Option<String>,

    #[serde(default)]
    pub secret_access_key: Option<String>,

    #[serde(default)]
    pub force_path_style: bool,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

/// Resolved credentials for an enabled object store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStoreCredentials<'a> {
    pub bucket: &'a str,
    pub access_key_id: &'a str,
    pub secret_access_key: &'a str,
}

impl ObjectStoreConfig {
    /// Credentials for the store, or `None` when anything required is missing.
    pub fn credentials(&self) -> Option<ObjectStoreCredentials<'_>> {
        let bucket = self.bucket.as_deref().filter(|b| !b.is_empty())?;
        let access_key_id = self.access_key_id.as_deref().filter(|k| !k.is_empty())?;
        let secret_access_key = self.secret_access_key.as_deref().filter(|k| !k.is_empty())?;
        Some(ObjectStoreCredentials { bucket, access_key_id, secret_access_key })
    }

    pub fn is_enabled(&self) -> bool {
        self.credentials().is_some()
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./chordium-cache.sqlite")
}

fn default_bind_addr() -> String {
    "127.0.0.1:3001".into()
}

fn default_source_base_url() -> String {
    "https://www.cifraclub.com.br".into()
}

fn default_user_agent() -> String {
    "chordium/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_regular_ttl_secs() -> u64 {
    86_400 // 24h
}

fn default_max_regular_items() -> usize {
    500
}

fn default_region() -> String {
    "us-east-1".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_addr: default_bind_addr(),
            source_base_url: default_source_base_url(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            regular_ttl_secs: default_regular_ttl_secs(),
            max_regular_items: default_max_regular_items(),
            sweep_interval_secs: 0,
            single_flight: false,
            object_store: ObjectStoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Regular-tier TTL as Duration.
    pub fn regular_ttl(&self) -> Duration {
        Duration::from_secs(self.regular_ttl_secs)
    }

    /// Sweep interval, or `None` when only lazy expiration is wanted.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CHORDIUM_`
    /// 2. TOML file from `CHORDIUM_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CHORDIUM_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CHORDIUM_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
