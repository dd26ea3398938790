//! Node configuration.

use std::time::Duration;

use fxrates_common::CurrencyCode;
use fxrates_engine::EngineConfig;
use fxrates_store::PgStoreConfig;

/// Where snapshots are persisted.
#[derive(Debug, Clone, Default)]
pub enum StoreConfig {
    /// In-process store; state is lost on exit.
    #[default]
    Memory,
    /// PostgreSQL via a connection pool.
    Postgres(PgStoreConfig),
}

/// Periodic sync configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Run the sync loop at all.
    pub enabled: bool,
    /// Time between fetches.
    pub interval: Duration,
    /// Latest-rates endpoint. `{date}` is replaced by the current UTC date.
    pub source_url: String,
    /// Application id sent as the `app_id` query parameter.
    pub app_id: String,
    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(24 * 60 * 60),
            source_url: "https://openexchangerates.org/api/historical/{date}.json".to_string(),
            app_id: String::new(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Main node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Persistence backend.
    pub store: StoreConfig,
    /// Periodic sync.
    pub sync: SyncConfig,
    /// Only accept payloads quoted against this base.
    pub canonical_base: Option<String>,
    /// Refuse conversions across snapshots with different bases.
    pub verify_shared_base: bool,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            sync: SyncConfig::default(),
            canonical_base: None,
            verify_shared_base: true,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.is_empty()) {
            let mut pg = PgStoreConfig::new(url);
            if let Some(max) = lookup("FXRATES_DB_MAX_CONNECTIONS").and_then(|v| v.parse().ok()) {
                pg.max_connections = max;
            }
            if let Some(secs) = lookup("FXRATES_DB_ACQUIRE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
                pg.acquire_timeout = Duration::from_secs(secs);
            }
            config.store = StoreConfig::Postgres(pg);
        }

        if let Some(enabled) = lookup("FXRATES_SYNC_ENABLED").and_then(|v| v.parse().ok()) {
            config.sync.enabled = enabled;
        }

        if let Some(secs) = lookup("FXRATES_SYNC_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            config.sync.interval = Duration::from_secs(secs);
        }

        if let Some(url) = lookup("FXRATES_SOURCE_URL") {
            config.sync.source_url = url;
        }

        if let Some(app_id) = lookup("FXRATES_APP_ID") {
            config.sync.app_id = app_id;
        }

        if let Some(secs) = lookup("FXRATES_SOURCE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.sync.request_timeout = Duration::from_secs(secs);
        }

        if let Some(base) = lookup("FXRATES_CANONICAL_BASE").filter(|b| !b.trim().is_empty()) {
            config.canonical_base = Some(base);
        }

        if let Some(verify) = lookup("FXRATES_VERIFY_SHARED_BASE").and_then(|v| v.parse().ok()) {
            config.verify_shared_base = verify;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if let StoreConfig::Postgres(pg) = &self.store {
            if pg.max_connections == 0 {
                return Err("Database pool needs at least one connection".to_string());
            }
        }

        if self.sync.enabled {
            if self.sync.interval.is_zero() {
                return Err("Sync interval cannot be 0".to_string());
            }
            if self.sync.source_url.is_empty() {
                return Err("Source URL cannot be empty when sync is enabled".to_string());
            }
            if self.sync.app_id.is_empty() {
                return Err("App id cannot be empty when sync is enabled".to_string());
            }
        }

        if let Some(base) = &self.canonical_base {
            CurrencyCode::parse(base).map_err(|e| format!("Canonical base: {}", e))?;
        }

        Ok(())
    }

    /// Engine settings derived from this configuration.
    pub fn engine_config(&self) -> Result<EngineConfig, String> {
        let canonical_base = self
            .canonical_base
            .as_deref()
            .map(CurrencyCode::parse)
            .transpose()
            .map_err(|e| format!("Canonical base: {}", e))?;

        Ok(EngineConfig {
            canonical_base,
            verify_shared_base: self.verify_shared_base,
        })
    }
}
