//! FxRates Node Binary
//!
//! Keeps exchange-rate snapshots current by polling an upstream endpoint.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fxrates_engine::RatesEngine;
use fxrates_node::{HttpSource, NodeConfig, StoreConfig, SyncService};
use fxrates_store::{MemoryStore, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = NodeConfig::from_env();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting FxRates node");

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }
    let engine_config = config.engine_config().map_err(anyhow::Error::msg)?;

    // Wire the store
    let mut pg_store = None;
    let engine = match &config.store {
        StoreConfig::Memory => {
            warn!("No DATABASE_URL set, snapshots are kept in memory only");
            RatesEngine::new(Arc::new(MemoryStore::new()), engine_config)
        }
        StoreConfig::Postgres(pg) => {
            let store = Arc::new(PgStore::connect(pg).await?);
            store.migrate().await?;
            pg_store = Some(store.clone());
            RatesEngine::new(store, engine_config)
        }
    };
    let engine = Arc::new(engine);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Shutdown signal received");
    };

    if config.sync.enabled {
        let source = Arc::new(HttpSource::new(&config.sync)?);
        let sync = SyncService::new(engine.clone(), source, config.sync.interval);
        sync.run(shutdown).await;
    } else {
        info!("Sync disabled, waiting for shutdown");
        shutdown.await;
    }

    if let Some(store) = pg_store {
        store.close().await;
    }

    info!(metrics = ?engine.metrics(), "FxRates node shutdown complete");
    Ok(())
}
