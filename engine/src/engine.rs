//! Engine facade wiring registry, rate store, ingestion and conversion.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use fxrates_common::{to_unix_seconds, Currency, CurrencyCode, CurrencyId, IngestRequest, RateSnapshot};
use fxrates_store::{CurrencyRepository, SnapshotRepository};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::conversion::{Conversion, ConversionEngine};
use crate::error::{FxError, FxResult};
use crate::ingestion::{IngestReport, IngestionPipeline};
use crate::metrics::{EngineMetrics, MetricsSnapshot, SharedMetrics};
use crate::rate_store::RateStore;
use crate::registry::CurrencyRegistry;

/// Configuration for the rates engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// When set, ingestion rejects payloads quoted against any other base.
    pub canonical_base: Option<CurrencyCode>,
    /// Refuse to convert between snapshots quoted against different bases.
    pub verify_shared_base: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canonical_base: None,
            verify_shared_base: true,
        }
    }
}

/// Listing of every rate recorded at one instant against one base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatesSheet {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub base: CurrencyCode,
    pub rates: BTreeMap<CurrencyCode, Decimal>,
}

/// The rates engine.
///
/// Holds no state of its own beyond counters; everything persistent lives
/// behind the repositories it was built with.
pub struct RatesEngine {
    registry: Arc<CurrencyRegistry>,
    rates: Arc<RateStore>,
    ingestion: IngestionPipeline,
    conversion: ConversionEngine,
    metrics: SharedMetrics,
}

impl RatesEngine {
    /// Create an engine over a store implementing both repositories.
    pub fn new<S>(store: Arc<S>, config: EngineConfig) -> Self
    where
        S: CurrencyRepository + SnapshotRepository + 'static,
    {
        Self::from_parts(store.clone(), store, config)
    }

    /// Create an engine over separate repositories.
    pub fn from_parts(
        currencies: Arc<dyn CurrencyRepository>,
        snapshots: Arc<dyn SnapshotRepository>,
        config: EngineConfig,
    ) -> Self {
        let metrics = Arc::new(EngineMetrics::new());
        let registry = Arc::new(CurrencyRegistry::new(currencies.clone()));
        let rates = Arc::new(RateStore::new(snapshots, currencies));

        let ingestion = IngestionPipeline::new(registry.clone(), rates.clone(), metrics.clone())
            .with_canonical_base(config.canonical_base.clone());
        let conversion = ConversionEngine::new(rates.clone(), metrics.clone())
            .with_shared_base_check(config.verify_shared_base);

        info!(
            canonical_base = ?config.canonical_base,
            verify_shared_base = config.verify_shared_base,
            "Rates engine created"
        );

        Self {
            registry,
            rates,
            ingestion,
            conversion,
            metrics,
        }
    }

    /// Validate and persist a payload. See [`IngestionPipeline::ingest`].
    pub async fn ingest(&self, request: IngestRequest) -> FxResult<IngestReport> {
        self.ingestion.ingest(request).await
    }

    /// Snapshots filtered by optional code and timestamp.
    pub async fn query(
        &self,
        currency: Option<&str>,
        timestamp: Option<i64>,
    ) -> FxResult<Vec<RateSnapshot>> {
        self.rates.query(currency, timestamp).await
    }

    /// Snapshots within `[start, end]`.
    pub async fn query_range(
        &self,
        currency: Option<&str>,
        start: i64,
        end: i64,
    ) -> FxResult<Vec<RateSnapshot>> {
        self.rates.query_range(currency, start, end).await
    }

    /// Most recent snapshot for `currency`.
    pub async fn latest(&self, currency: &str) -> FxResult<RateSnapshot> {
        self.rates.latest(currency).await
    }

    /// Every known currency, sorted by code.
    pub async fn list_currencies(&self) -> FxResult<Vec<Currency>> {
        self.registry.list_all().await
    }

    /// Total persisted snapshots.
    pub async fn count(&self) -> FxResult<u64> {
        self.rates.count().await
    }

    /// Convert `amount` of `from` into `to` using the latest rates.
    pub async fn convert(&self, from: &str, to: &str, amount: Decimal) -> FxResult<Conversion> {
        let conversion = self.conversion.convert(from, to, amount).await?;
        info!(
            conversion_id = %conversion.id,
            input = %conversion.input,
            output = %conversion.output,
            "Conversion completed"
        );
        Ok(conversion)
    }

    /// Re-express `snapshots` against `target`'s latest rate.
    pub async fn rebase(
        &self,
        snapshots: Vec<RateSnapshot>,
        target: &str,
    ) -> FxResult<Vec<RateSnapshot>> {
        self.conversion.rebase(snapshots, target).await
    }

    /// Set or clear a currency's display name.
    pub async fn rename_currency(&self, code: &str, name: Option<&str>) -> FxResult<Currency> {
        self.registry.rename(code, name).await
    }

    /// Rates recorded at the most recent matching instant, keyed by code.
    ///
    /// When several bases were ingested at that instant the first base in
    /// snapshot order is used.
    #[instrument(skip(self))]
    pub async fn sheet(
        &self,
        currency: Option<&str>,
        timestamp: Option<i64>,
    ) -> FxResult<RatesSheet> {
        let snapshots = self.rates.query(currency, timestamp).await?;
        let Some(instant) = snapshots.iter().map(|s| s.timestamp).max() else {
            return Err(FxError::NotFound("no rates match the query".to_string()));
        };

        let at_instant: Vec<&RateSnapshot> =
            snapshots.iter().filter(|s| s.timestamp == instant).collect();
        let base_id = at_instant[0].base_currency_id;

        let codes: HashMap<CurrencyId, CurrencyCode> = self
            .registry
            .list_all()
            .await?
            .into_iter()
            .map(|c| (c.id, c.code))
            .collect();
        let code_of = |id: CurrencyId| {
            codes.get(&id).cloned().ok_or_else(|| {
                FxError::NotFound(format!("currency {} referenced by a snapshot", id))
            })
        };

        let mut rates = BTreeMap::new();
        for snapshot in at_instant.into_iter().filter(|s| s.base_currency_id == base_id) {
            rates.insert(code_of(snapshot.currency_id)?, snapshot.rate);
        }

        debug!(rates = rates.len(), "Rates sheet built");
        Ok(RatesSheet {
            timestamp: to_unix_seconds(instant),
            base: code_of(base_id)?,
            rates,
        })
    }

    /// Get current metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use fxrates_store::MemoryStore;
    use rust_decimal_macros::dec;

    const TS: i64 = 1_700_000_000;

    fn engine() -> RatesEngine {
        RatesEngine::new(Arc::new(MemoryStore::new()), EngineConfig::default())
    }

    fn usd_rates(eur: Decimal) -> IngestRequest {
        IngestRequest::new(TS, "USD")
            .with_rate("EUR", eur)
            .with_rate("GBP", dec!(0.79))
    }

    #[tokio::test]
    async fn test_ingest_then_query() {
        let engine = engine();
        let before = engine.count().await.unwrap();

        engine.ingest(usd_rates(dec!(0.92))).await.unwrap();

        let codes: Vec<String> = engine
            .list_currencies()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.code.to_string())
            .collect();
        assert_eq!(codes, ["EUR", "GBP", "USD"]);

        let eur = engine.query(Some("EUR"), Some(TS)).await.unwrap();
        assert_eq!(eur.len(), 1);
        assert_eq!(eur[0].rate, dec!(0.92));
        assert_eq!(engine.count().await.unwrap(), before + 2);
    }

    #[tokio::test]
    async fn test_reingest_overwrites() {
        let engine = engine();

        engine.ingest(usd_rates(dec!(0.92))).await.unwrap();
        engine.ingest(usd_rates(dec!(0.93))).await.unwrap();

        let eur = engine.query(Some("eur"), Some(TS)).await.unwrap();
        assert_eq!(eur.len(), 1);
        assert_eq!(eur[0].rate, dec!(0.93));
        assert_eq!(engine.query(None, Some(TS)).await.unwrap().len(), 2);
        assert_eq!(engine.metrics().batches_ingested, 2);
    }

    #[tokio::test]
    async fn test_ingested_json_payload_converts() {
        let engine = engine();
        let request: IngestRequest = serde_json::from_str(
            r#"{"timestamp": 1700000000, "base": "USD", "rates": {"EUR": 0.92, "GBP": 0.79}}"#,
        )
        .unwrap();
        engine.ingest(request).await.unwrap();

        let conversion = engine.convert("EUR", "GBP", dec!(100)).await.unwrap();

        assert_eq!(conversion.rounded().value, dec!(85.87));
        assert_eq!(engine.metrics().conversions, 1);
    }

    #[tokio::test]
    async fn test_rebase_and_range_through_facade() {
        let engine = engine();
        engine.ingest(usd_rates(dec!(0.92))).await.unwrap();
        engine
            .ingest(IngestRequest::new(TS + 60, "USD").with_rate("EUR", dec!(0.94)))
            .await
            .unwrap();

        let window = engine.query_range(None, TS, TS + 60).await.unwrap();
        assert_eq!(window.len(), 3);
        assert!(engine.query_range(None, TS + 60, TS).await.unwrap().is_empty());

        assert_eq!(engine.latest("EUR").await.unwrap().rate, dec!(0.94));

        let rebased = engine.rebase(window, "EUR").await.unwrap();
        let gbp = rebased.iter().find(|s| s.rate != dec!(0.92) && s.rate != dec!(0.94));
        assert!(gbp.is_some());
        assert_eq!(engine.metrics().rebases, 1);
    }

    #[tokio::test]
    async fn test_canonical_base_from_config() {
        let engine = RatesEngine::new(
            Arc::new(MemoryStore::new()),
            EngineConfig {
                canonical_base: Some(CurrencyCode::usd()),
                ..EngineConfig::default()
            },
        );

        engine.ingest(usd_rates(dec!(0.92))).await.unwrap();
        let err = engine
            .ingest(IngestRequest::new(TS, "EUR").with_rate("GBP", dec!(0.86)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(engine.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sheet_uses_latest_instant() {
        let engine = engine();
        engine.ingest(usd_rates(dec!(0.92))).await.unwrap();
        engine
            .ingest(IngestRequest::new(TS + 3600, "USD").with_rate("EUR", dec!(0.95)))
            .await
            .unwrap();

        let sheet = engine.sheet(None, None).await.unwrap();
        assert_eq!(sheet.timestamp, TS + 3600);
        assert_eq!(sheet.base, CurrencyCode::usd());
        assert_eq!(sheet.rates.len(), 1);
        assert_eq!(sheet.rates[&CurrencyCode::eur()], dec!(0.95));

        let earlier = engine.sheet(None, Some(TS)).await.unwrap();
        assert_eq!(earlier.rates.len(), 2);
        assert_eq!(earlier.rates[&CurrencyCode::gbp()], dec!(0.79));

        let json = serde_json::to_value(&earlier).unwrap();
        assert_eq!(json["base"], "USD");
        assert_eq!(json["timestamp"], TS);

        let err = engine.sheet(Some("JPY"), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rename_currency() {
        let engine = engine();
        engine.ingest(usd_rates(dec!(0.92))).await.unwrap();

        let renamed = engine.rename_currency("gbp", Some("Pound sterling")).await.unwrap();

        assert_eq!(renamed.code, CurrencyCode::gbp());
        assert_eq!(renamed.name.as_deref(), Some("Pound sterling"));
    }
}
