//! Snapshot persistence and queries by currency code.

use std::sync::Arc;

use fxrates_common::{
    from_unix_seconds, CurrencyCode, CurrencyId, NewSnapshot, RateSnapshot, SnapshotKey,
    Timestamp,
};
use fxrates_store::{CurrencyRepository, SnapshotFilter, SnapshotRepository, TimeWindow};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::error::{FxError, FxResult};

/// Owns persisted snapshot state.
///
/// Currency codes are translated to identities with read-only lookups; the
/// store never creates currencies.
pub struct RateStore {
    snapshots: Arc<dyn SnapshotRepository>,
    currencies: Arc<dyn CurrencyRepository>,
}

impl RateStore {
    pub fn new(
        snapshots: Arc<dyn SnapshotRepository>,
        currencies: Arc<dyn CurrencyRepository>,
    ) -> Self {
        Self {
            snapshots,
            currencies,
        }
    }

    /// Write or overwrite the snapshot under its `(currency, base, timestamp)` key.
    #[instrument(skip(self, snapshot), fields(
        currency_id = %snapshot.currency_id,
        base_currency_id = %snapshot.base_currency_id,
        timestamp = %snapshot.timestamp,
        rate = %snapshot.rate,
    ))]
    pub async fn upsert(&self, snapshot: NewSnapshot) -> FxResult<RateSnapshot> {
        if snapshot.rate <= Decimal::ZERO {
            return Err(FxError::InvalidArgument(format!(
                "rate must be positive, got {}",
                snapshot.rate
            )));
        }

        let stored = self
            .snapshots
            .upsert(snapshot)
            .await
            .map_err(|e| FxError::store("upsert snapshot", e))?;

        debug!(snapshot_id = %stored.id, "Snapshot upserted");
        Ok(stored)
    }

    /// Point lookup by logical key.
    pub async fn get(&self, key: &SnapshotKey) -> FxResult<Option<RateSnapshot>> {
        self.snapshots
            .get(key)
            .await
            .map_err(|e| FxError::store("get snapshot", e))
    }

    /// Snapshots for an optional currency at an optional timestamp.
    ///
    /// `None`, an empty code and a zero timestamp all mean "no filter".
    #[instrument(skip(self))]
    pub async fn query(
        &self,
        currency: Option<&str>,
        timestamp: Option<i64>,
    ) -> FxResult<Vec<RateSnapshot>> {
        let window = match timestamp.filter(|ts| *ts != 0) {
            Some(ts) => TimeWindow::At(to_instant(ts)?),
            None => TimeWindow::Any,
        };
        self.find(currency, window).await
    }

    /// Snapshots with timestamp in `[start, end]`, both Unix seconds.
    ///
    /// An inverted range is empty, not an error.
    #[instrument(skip(self))]
    pub async fn query_range(
        &self,
        currency: Option<&str>,
        start: i64,
        end: i64,
    ) -> FxResult<Vec<RateSnapshot>> {
        if end < start {
            debug!("Inverted range, nothing to return");
            return Ok(Vec::new());
        }

        let window = TimeWindow::Between {
            start: to_instant(start)?,
            end: to_instant(end)?,
        };
        let found = self.find(currency, window).await?;
        debug!(found = found.len(), "Range query completed");
        Ok(found)
    }

    /// Most recent snapshot for a currency. Ties on timestamp resolve arbitrarily.
    #[instrument(skip(self))]
    pub async fn latest(&self, currency: &str) -> FxResult<RateSnapshot> {
        if currency.trim().is_empty() {
            return Err(FxError::InvalidArgument("currency code is empty".to_string()));
        }
        let code = CurrencyCode::parse(currency)?;
        self.latest_for(&code).await
    }

    /// Most recent snapshot for a normalized code.
    pub async fn latest_for(&self, code: &CurrencyCode) -> FxResult<RateSnapshot> {
        let currency_id = self
            .currency_id(code)
            .await?
            .ok_or_else(|| FxError::NotFound(format!("no currency {}", code)))?;

        self.snapshots
            .latest(currency_id)
            .await
            .map_err(|e| FxError::store(format!("latest {}", code), e))?
            .ok_or_else(|| FxError::NotFound(format!("no snapshot for {}", code)))
    }

    /// Total number of persisted snapshots.
    pub async fn count(&self) -> FxResult<u64> {
        self.snapshots
            .count()
            .await
            .map_err(|e| FxError::store("count snapshots", e))
    }

    async fn find(&self, currency: Option<&str>, window: TimeWindow) -> FxResult<Vec<RateSnapshot>> {
        let mut filter = SnapshotFilter::all().within(window);

        match currency.map(str::trim).filter(|c| !c.is_empty()) {
            None => {}
            Some(raw) => {
                let code = CurrencyCode::parse(raw)?;
                match self.currency_id(&code).await? {
                    Some(id) => filter = filter.for_currency(id),
                    // Well-formed but never seen: matches nothing.
                    None => return Ok(Vec::new()),
                }
            }
        }

        self.snapshots
            .find(&filter)
            .await
            .map_err(|e| FxError::store("query snapshots", e))
    }

    async fn currency_id(&self, code: &CurrencyCode) -> FxResult<Option<CurrencyId>> {
        self.currencies
            .find_by_code(code)
            .await
            .map(|found| found.map(|currency| currency.id))
            .map_err(|e| FxError::store(format!("find currency {}", code), e))
    }
}

fn to_instant(seconds: i64) -> FxResult<Timestamp> {
    from_unix_seconds(seconds)
        .ok_or_else(|| FxError::InvalidArgument(format!("timestamp {} out of range", seconds)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use fxrates_common::Currency;
    use fxrates_store::{FaultyStore, MemoryStore};
    use fxrates_common::StoreError;
    use rust_decimal_macros::dec;

    struct Fixture {
        store: Arc<MemoryStore>,
        rates: RateStore,
        usd: Currency,
        eur: Currency,
        gbp: Currency,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let rates = RateStore::new(store.clone(), store.clone());
        let usd = store.create(&CurrencyCode::usd(), None).await.unwrap();
        let eur = store.create(&CurrencyCode::eur(), None).await.unwrap();
        let gbp = store.create(&CurrencyCode::gbp(), None).await.unwrap();
        Fixture {
            store,
            rates,
            usd,
            eur,
            gbp,
        }
    }

    fn pending(currency: &Currency, base: &Currency, rate: Decimal, secs: i64) -> NewSnapshot {
        NewSnapshot {
            currency_id: currency.id,
            base_currency_id: base.id,
            rate,
            timestamp: from_unix_seconds(secs).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_upsert_then_point_lookup_returns_last_write() {
        let f = fixture().await;

        f.rates.upsert(pending(&f.eur, &f.usd, dec!(0.92), 1_700_000_000)).await.unwrap();
        let second = f
            .rates
            .upsert(pending(&f.eur, &f.usd, dec!(0.93), 1_700_000_000))
            .await
            .unwrap();

        let stored = f.rates.get(&second.key()).await.unwrap().unwrap();
        assert_eq!(stored.rate, dec!(0.93));
        assert_eq!(f.rates.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_non_positive_rate() {
        let f = fixture().await;

        let err = f
            .rates
            .upsert(pending(&f.eur, &f.usd, dec!(0), 1_700_000_000))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(f.rates.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_filters() {
        let f = fixture().await;
        f.rates.upsert(pending(&f.eur, &f.usd, dec!(0.92), 100)).await.unwrap();
        f.rates.upsert(pending(&f.gbp, &f.usd, dec!(0.79), 100)).await.unwrap();
        f.rates.upsert(pending(&f.eur, &f.usd, dec!(0.93), 200)).await.unwrap();

        assert_eq!(f.rates.query(None, None).await.unwrap().len(), 3);
        assert_eq!(f.rates.query(Some(""), Some(0)).await.unwrap().len(), 3);
        assert_eq!(f.rates.query(Some("eur"), None).await.unwrap().len(), 2);
        assert_eq!(f.rates.query(None, Some(100)).await.unwrap().len(), 2);

        let point = f.rates.query(Some("EUR"), Some(200)).await.unwrap();
        assert_eq!(point.len(), 1);
        assert_eq!(point[0].rate, dec!(0.93));
    }

    #[tokio::test]
    async fn test_query_unknown_code_is_empty() {
        let f = fixture().await;
        f.rates.upsert(pending(&f.eur, &f.usd, dec!(0.92), 100)).await.unwrap();

        assert!(f.rates.query(Some("JPY"), None).await.unwrap().is_empty());
        assert_eq!(
            f.rates.query(Some("JP"), None).await.unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[tokio::test]
    async fn test_query_range_inclusive_and_inverted() {
        let f = fixture().await;
        for (secs, rate) in [(100, dec!(0.90)), (200, dec!(0.91)), (300, dec!(0.92))] {
            f.rates.upsert(pending(&f.eur, &f.usd, rate, secs)).await.unwrap();
        }

        let found = f.rates.query_range(Some("EUR"), 100, 200).await.unwrap();
        let secs: Vec<i64> = found.iter().map(|s| s.timestamp.timestamp()).collect();
        assert_eq!(secs, vec![100, 200]);

        assert!(f.rates.query_range(Some("EUR"), 300, 100).await.unwrap().is_empty());
        assert!(f.rates.query_range(None, 301, 400).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_and_not_found() {
        let f = fixture().await;
        f.rates.upsert(pending(&f.eur, &f.usd, dec!(0.91), 100)).await.unwrap();
        f.rates.upsert(pending(&f.eur, &f.usd, dec!(0.93), 300)).await.unwrap();
        f.rates.upsert(pending(&f.eur, &f.usd, dec!(0.92), 200)).await.unwrap();

        assert_eq!(f.rates.latest("eur").await.unwrap().rate, dec!(0.93));
        assert_eq!(f.rates.latest("GBP").await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(f.rates.latest("JPY").await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(f.rates.latest("").await.unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(f.store.currency_count(), 3);
    }

    #[tokio::test]
    async fn test_store_outage_is_wrapped() {
        let store = Arc::new(FaultyStore::new());
        let rates = RateStore::new(store.clone(), store.clone());
        store.set_unavailable(true);

        let err = rates.count().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(err.to_string().contains("count snapshots"));

        store.set_unavailable(false);
        store.fail_currency("EUR", StoreError::Unavailable("timeout".into()));
        assert_eq!(
            rates.query(Some("EUR"), None).await.unwrap_err().kind(),
            ErrorKind::StoreUnavailable
        );
    }
}
