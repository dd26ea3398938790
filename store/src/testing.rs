//! Fault-injecting store for exercising failure paths.

use async_trait::async_trait;
use dashmap::DashMap;
use fxrates_common::{
    Currency, CurrencyCode, CurrencyId, NewSnapshot, RateSnapshot, SnapshotKey, StoreError,
    StoreResult,
};
use parking_lot::Mutex;

use crate::memory::MemoryStore;
use crate::repository::{CurrencyRepository, SnapshotFilter, SnapshotRepository};

/// Wraps a [`MemoryStore`] and fails selected calls.
///
/// Every currency lookup is recorded so tests can tell which codes were
/// attempted.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    currency_faults: DashMap<CurrencyCode, StoreError>,
    upsert_faults: DashMap<CurrencyCode, StoreError>,
    conflict_once: DashMap<CurrencyCode, ()>,
    unavailable: Mutex<bool>,
    lookups: Mutex<Vec<CurrencyCode>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail both lookup and creation of `code`.
    pub fn fail_currency(&self, code: &str, error: StoreError) {
        self.currency_faults.insert(parse(code), error);
    }

    /// Fail snapshot writes whose currency is `code`.
    pub fn fail_upsert(&self, code: &str, error: StoreError) {
        self.upsert_faults.insert(parse(code), error);
    }

    /// Make the next creation of `code` lose a race: the record is created
    /// by a "concurrent writer" and the caller receives `Conflict`.
    pub fn conflict_once(&self, code: &str) {
        self.conflict_once.insert(parse(code), ());
    }

    /// Fail every call with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock() = unavailable;
    }

    /// Codes passed to `find_by_code`, in call order.
    pub fn lookups(&self) -> Vec<CurrencyCode> {
        self.lookups.lock().clone()
    }

    /// The wrapped store, for assertions that bypass fault injection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn check_available(&self) -> StoreResult<()> {
        if *self.unavailable.lock() {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        Ok(())
    }

    fn check_currency(&self, code: &CurrencyCode) -> StoreResult<()> {
        self.check_available()?;
        match self.currency_faults.get(code) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn parse(code: &str) -> CurrencyCode {
    CurrencyCode::parse(code).unwrap_or_else(|e| panic!("{}", e))
}

#[async_trait]
impl CurrencyRepository for FaultyStore {
    async fn find_by_code(&self, code: &CurrencyCode) -> StoreResult<Option<Currency>> {
        self.lookups.lock().push(code.clone());
        self.check_currency(code)?;
        self.inner.find_by_code(code).await
    }

    async fn create(&self, code: &CurrencyCode, name: Option<&str>) -> StoreResult<Currency> {
        self.check_currency(code)?;
        if self.conflict_once.remove(code).is_some() {
            self.inner.create(code, name).await?;
            return Err(StoreError::Conflict(format!("duplicate currency {}", code)));
        }
        self.inner.create(code, name).await
    }

    async fn set_name(&self, code: &CurrencyCode, name: Option<&str>) -> StoreResult<Currency> {
        self.check_currency(code)?;
        self.inner.set_name(code, name).await
    }

    async fn list(&self) -> StoreResult<Vec<Currency>> {
        self.check_available()?;
        self.inner.list().await
    }
}

#[async_trait]
impl SnapshotRepository for FaultyStore {
    async fn upsert(&self, snapshot: NewSnapshot) -> StoreResult<RateSnapshot> {
        self.check_available()?;
        if let Some(code) = self.inner.code_of(snapshot.currency_id) {
            if let Some(err) = self.upsert_faults.get(&code) {
                return Err(err.clone());
            }
        }
        self.inner.upsert(snapshot).await
    }

    async fn get(&self, key: &SnapshotKey) -> StoreResult<Option<RateSnapshot>> {
        self.check_available()?;
        self.inner.get(key).await
    }

    async fn find(&self, filter: &SnapshotFilter) -> StoreResult<Vec<RateSnapshot>> {
        self.check_available()?;
        self.inner.find(filter).await
    }

    async fn latest(&self, currency_id: CurrencyId) -> StoreResult<Option<RateSnapshot>> {
        self.check_available()?;
        self.inner.latest(currency_id).await
    }

    async fn count(&self) -> StoreResult<u64> {
        self.check_available()?;
        self.inner.count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_conflict_once_creates_then_errors() {
        let store = FaultyStore::new();
        store.conflict_once("EUR");

        let first = store.create(&CurrencyCode::eur(), None).await;
        assert!(matches!(first, Err(StoreError::Conflict(_))));
        assert!(store.find_by_code(&CurrencyCode::eur()).await.unwrap().is_some());

        let second = store.create(&CurrencyCode::eur(), None).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_outage_fails_everything() {
        let store = FaultyStore::new();
        store.set_unavailable(true);

        assert!(store.list().await.is_err());
        assert!(store.count().await.is_err());

        store.set_unavailable(false);
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
