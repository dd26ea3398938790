//! Snapshot ingestion.

use std::collections::BTreeMap;
use std::sync::Arc;

use fxrates_common::{
    from_unix_seconds, Currency, CurrencyCode, IngestRequest, NewSnapshot, RateSnapshot,
    Timestamp,
};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use crate::error::{FxError, FxResult};
use crate::metrics::EngineMetrics;
use crate::rate_store::RateStore;
use crate::registry::CurrencyRegistry;

/// Outcome of a fully ingested batch.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Resolved base currency.
    pub base: Currency,
    /// Instant shared by every rate of the batch.
    pub timestamp: Timestamp,
    /// Store-confirmed snapshots, in write order.
    pub written: Vec<RateSnapshot>,
}

/// A request that passed validation. Nothing has been written yet.
#[derive(Debug)]
struct ValidatedBatch {
    base: CurrencyCode,
    timestamp: Timestamp,
    rates: Vec<(CurrencyCode, Decimal)>,
}

/// Turns raw payloads into persisted snapshots.
///
/// Batches are not atomic. Each rate is an independent upsert; when one
/// fails the pipeline stops, and rates written before it stay written.
pub struct IngestionPipeline {
    registry: Arc<CurrencyRegistry>,
    rates: Arc<RateStore>,
    metrics: Arc<EngineMetrics>,
    canonical_base: Option<CurrencyCode>,
}

impl IngestionPipeline {
    pub fn new(
        registry: Arc<CurrencyRegistry>,
        rates: Arc<RateStore>,
        metrics: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            registry,
            rates,
            metrics,
            canonical_base: None,
        }
    }

    /// Reject requests quoted against any base other than `base`.
    pub fn with_canonical_base(mut self, base: Option<CurrencyCode>) -> Self {
        self.canonical_base = base;
        self
    }

    /// Ingest one payload.
    #[instrument(skip(self, request), fields(
        base = %request.base,
        timestamp = request.timestamp,
        rates = request.rates.len(),
    ))]
    pub async fn ingest(&self, request: IngestRequest) -> FxResult<IngestReport> {
        let batch = self.validate(request).map_err(|e| self.reject(e))?;

        let base = self
            .registry
            .resolve_code(&batch.base)
            .await
            .map_err(|e| self.abort(batch.base.as_str(), 0, e))?;

        let mut written = Vec::with_capacity(batch.rates.len());
        for (code, rate) in batch.rates {
            match self.write_rate(&base, &code, rate, batch.timestamp).await {
                Ok(snapshot) => written.push(snapshot),
                Err(e) => return Err(self.abort(code.as_str(), written.len(), e)),
            }
        }

        self.metrics.batch_ingested(written.len());
        info!(
            base_currency_id = %base.id,
            written = written.len(),
            "Exchange rates ingested"
        );

        Ok(IngestReport {
            base,
            timestamp: batch.timestamp,
            written,
        })
    }

    async fn write_rate(
        &self,
        base: &Currency,
        code: &CurrencyCode,
        rate: Decimal,
        timestamp: Timestamp,
    ) -> FxResult<RateSnapshot> {
        let currency = self.registry.resolve_code(code).await?;
        let snapshot = self
            .rates
            .upsert(NewSnapshot {
                currency_id: currency.id,
                base_currency_id: base.id,
                rate,
                timestamp,
            })
            .await?;

        debug!(code = %code, rate = %rate, "Rate written");
        Ok(snapshot)
    }

    fn reject(&self, source: FxError) -> FxError {
        self.metrics.batch_failed(0);
        warn!(error = %source, "Ingestion rejected, nothing written");
        source
    }

    fn abort(&self, code: &str, written: usize, source: FxError) -> FxError {
        self.metrics.batch_failed(written);
        warn!(
            code = %code,
            written,
            error = %source,
            "Ingestion aborted, earlier rates remain persisted"
        );
        FxError::IngestAborted {
            code: code.to_string(),
            written,
            source: Box::new(source),
        }
    }

    /// Check the whole payload before the first write.
    fn validate(&self, request: IngestRequest) -> FxResult<ValidatedBatch> {
        let base = CurrencyCode::parse(&request.base)
            .map_err(|e| FxError::InvalidArgument(format!("base: {}", e)))?;

        if let Some(canonical) = &self.canonical_base {
            if &base != canonical {
                return Err(FxError::InvalidArgument(format!(
                    "base {} differs from canonical base {}",
                    base, canonical
                )));
            }
        }

        let timestamp = from_unix_seconds(request.timestamp).ok_or_else(|| {
            FxError::InvalidArgument(format!("timestamp {} out of range", request.timestamp))
        })?;

        let mut rates: BTreeMap<CurrencyCode, Decimal> = BTreeMap::new();
        for (raw, rate) in request.rates {
            let code = CurrencyCode::parse(&raw)?;
            if rate <= Decimal::ZERO {
                return Err(FxError::InvalidArgument(format!(
                    "rate for {} must be positive, got {}",
                    code, rate
                )));
            }
            if rates.insert(code.clone(), rate).is_some() {
                return Err(FxError::InvalidArgument(format!(
                    "currency {} appears more than once",
                    code
                )));
            }
        }

        Ok(ValidatedBatch {
            base,
            timestamp,
            rates: rates.into_iter().collect(),
        })
    }
}
