//! Periodic rates synchronization.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fxrates_engine::{FxResult, IngestReport, RatesEngine, RatesSource};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, instrument};

/// Pulls payloads from a source and feeds them to the engine.
///
/// Failures are logged and retried on the next tick only.
pub struct SyncService {
    engine: Arc<RatesEngine>,
    source: Arc<dyn RatesSource>,
    interval: Duration,
}

impl SyncService {
    pub fn new(engine: Arc<RatesEngine>, source: Arc<dyn RatesSource>, interval: Duration) -> Self {
        Self {
            engine,
            source,
            interval,
        }
    }

    /// Fetch once and ingest the payload.
    #[instrument(skip(self), fields(source = %self.source.name()))]
    pub async fn run_once(&self) -> FxResult<IngestReport> {
        let request = self.source.fetch().await?;
        let report = self.engine.ingest(request).await?;

        info!(
            base = %report.base.code,
            written = report.written.len(),
            "Sync completed"
        );
        Ok(report)
    }

    /// Sync on every tick until `shutdown` resolves. The first tick fires immediately.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "Sync loop started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(
                            error = %e,
                            error_code = e.error_code(),
                            retryable = e.is_retryable(),
                            "Sync failed"
                        );
                    }
                    info!(metrics = ?self.engine.metrics(), "Engine metrics");
                }
            }
        }
        info!("Sync loop stopped");
    }
}
