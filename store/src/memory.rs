//! In-process store over concurrent maps.

use async_trait::async_trait;
use dashmap::DashMap;
use fxrates_common::{
    Currency, CurrencyCode, CurrencyId, NewSnapshot, RateSnapshot, SnapshotId, SnapshotKey,
    StoreError, StoreResult,
};
use tracing::debug;

use crate::repository::{CurrencyRepository, SnapshotFilter, SnapshotRepository};

/// Thread-safe store with the same uniqueness rules as the database schema.
///
/// Both maps are keyed by the logical identity, so the entry API gives
/// create-if-absent for currencies and upsert for snapshots without any
/// engine-level locking.
#[derive(Debug, Default)]
pub struct MemoryStore {
    currencies: DashMap<CurrencyCode, Currency>,
    snapshots: DashMap<SnapshotKey, RateSnapshot>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currency records.
    pub fn currency_count(&self) -> usize {
        self.currencies.len()
    }

    /// Code of the currency holding `id`, if any.
    pub fn code_of(&self, id: CurrencyId) -> Option<CurrencyCode> {
        self.currencies
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.code.clone())
    }
}

#[async_trait]
impl CurrencyRepository for MemoryStore {
    async fn find_by_code(&self, code: &CurrencyCode) -> StoreResult<Option<Currency>> {
        Ok(self.currencies.get(code).map(|c| c.clone()))
    }

    async fn create(&self, code: &CurrencyCode, name: Option<&str>) -> StoreResult<Currency> {
        let currency = self
            .currencies
            .entry(code.clone())
            .or_insert_with(|| {
                debug!(code = %code, "Allocating currency identity");
                Currency {
                    id: CurrencyId::new(),
                    code: code.clone(),
                    name: name.map(str::to_string),
                }
            })
            .clone();
        Ok(currency)
    }

    async fn set_name(&self, code: &CurrencyCode, name: Option<&str>) -> StoreResult<Currency> {
        let mut entry = self
            .currencies
            .get_mut(code)
            .ok_or_else(|| StoreError::NotFound(format!("currency {}", code)))?;
        entry.name = name.map(str::to_string);
        Ok(entry.clone())
    }

    async fn list(&self) -> StoreResult<Vec<Currency>> {
        let mut currencies: Vec<Currency> =
            self.currencies.iter().map(|c| c.value().clone()).collect();
        currencies.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(currencies)
    }
}

#[async_trait]
impl SnapshotRepository for MemoryStore {
    async fn upsert(&self, snapshot: NewSnapshot) -> StoreResult<RateSnapshot> {
        let rate = snapshot.rate;
        let mut entry = self
            .snapshots
            .entry(snapshot.key())
            .or_insert_with(|| RateSnapshot::confirmed(SnapshotId::new(), snapshot));
        entry.rate = rate;
        Ok(entry.clone())
    }

    async fn get(&self, key: &SnapshotKey) -> StoreResult<Option<RateSnapshot>> {
        Ok(self.snapshots.get(key).map(|s| s.clone()))
    }

    async fn find(&self, filter: &SnapshotFilter) -> StoreResult<Vec<RateSnapshot>> {
        let mut found: Vec<RateSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| filter.matches(s.value()))
            .map(|s| s.value().clone())
            .collect();
        found.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.currency_id.cmp(&b.currency_id))
        });
        Ok(found)
    }

    async fn latest(&self, currency_id: CurrencyId) -> StoreResult<Option<RateSnapshot>> {
        Ok(self
            .snapshots
            .iter()
            .filter(|s| s.currency_id == currency_id)
            .max_by_key(|s| s.timestamp)
            .map(|s| s.value().clone()))
    }

    async fn count(&self) -> StoreResult<u64> {
        Ok(self.snapshots.len() as u64)
    }
}
