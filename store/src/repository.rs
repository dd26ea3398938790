//! Repository traits forming the persistence boundary.

use async_trait::async_trait;
use fxrates_common::{
    Currency, CurrencyCode, CurrencyId, NewSnapshot, RateSnapshot, SnapshotKey, StoreResult,
    Timestamp,
};

/// Currency identity storage.
///
/// Implementations must enforce uniqueness of `code`.
#[async_trait]
pub trait CurrencyRepository: Send + Sync {
    /// Look up a currency by its normalized code.
    async fn find_by_code(&self, code: &CurrencyCode) -> StoreResult<Option<Currency>>;

    /// Create a currency if no record holds `code` yet.
    ///
    /// Returns the store-confirmed record, which is the pre-existing one when
    /// another writer got there first. Stores that cannot merge duplicate
    /// creation attempts report them as `StoreError::Conflict`.
    async fn create(&self, code: &CurrencyCode, name: Option<&str>) -> StoreResult<Currency>;

    /// Set or clear the display name of an existing currency.
    async fn set_name(&self, code: &CurrencyCode, name: Option<&str>) -> StoreResult<Currency>;

    /// All currencies, sorted by code ascending.
    async fn list(&self) -> StoreResult<Vec<Currency>>;
}

/// Rate snapshot storage.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Insert or overwrite the snapshot stored under `snapshot.key()`.
    async fn upsert(&self, snapshot: NewSnapshot) -> StoreResult<RateSnapshot>;

    /// Point lookup by logical key.
    async fn get(&self, key: &SnapshotKey) -> StoreResult<Option<RateSnapshot>>;

    /// Snapshots matching the filter, ordered by timestamp.
    async fn find(&self, filter: &SnapshotFilter) -> StoreResult<Vec<RateSnapshot>>;

    /// Most recent snapshot for a currency, against any base.
    async fn latest(&self, currency_id: CurrencyId) -> StoreResult<Option<RateSnapshot>>;

    /// Total number of persisted snapshots.
    async fn count(&self) -> StoreResult<u64>;
}

/// Time constraint of a snapshot query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeWindow {
    /// Any timestamp.
    #[default]
    Any,
    /// Exactly this timestamp.
    At(Timestamp),
    /// Inclusive on both ends.
    Between { start: Timestamp, end: Timestamp },
}

impl TimeWindow {
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        match *self {
            TimeWindow::Any => true,
            TimeWindow::At(at) => timestamp == at,
            TimeWindow::Between { start, end } => start <= timestamp && timestamp <= end,
        }
    }
}

/// Filter for [`SnapshotRepository::find`]. The default matches everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotFilter {
    pub currency_id: Option<CurrencyId>,
    pub window: TimeWindow,
}

impl SnapshotFilter {
    /// Match every snapshot.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to one currency.
    pub fn for_currency(mut self, currency_id: CurrencyId) -> Self {
        self.currency_id = Some(currency_id);
        self
    }

    /// Restrict to a time window.
    pub fn within(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn matches(&self, snapshot: &RateSnapshot) -> bool {
        self.currency_id
            .map_or(true, |id| snapshot.currency_id == id)
            && self.window.contains(snapshot.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxrates_common::{from_unix_seconds, SnapshotId};
    use rust_decimal_macros::dec;

    fn snapshot(currency_id: CurrencyId, secs: i64) -> RateSnapshot {
        RateSnapshot {
            id: SnapshotId::new(),
            currency_id,
            base_currency_id: CurrencyId::new(),
            rate: dec!(1.5),
            timestamp: from_unix_seconds(secs).unwrap(),
        }
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = TimeWindow::Between {
            start: from_unix_seconds(100).unwrap(),
            end: from_unix_seconds(200).unwrap(),
        };

        assert!(window.contains(from_unix_seconds(100).unwrap()));
        assert!(window.contains(from_unix_seconds(200).unwrap()));
        assert!(!window.contains(from_unix_seconds(99).unwrap()));
        assert!(!window.contains(from_unix_seconds(201).unwrap()));
    }

    #[test]
    fn test_filter_matches_currency_and_time() {
        let eur = CurrencyId::new();
        let gbp = CurrencyId::new();
        let filter = SnapshotFilter::all()
            .for_currency(eur)
            .within(TimeWindow::At(from_unix_seconds(100).unwrap()));

        assert!(filter.matches(&snapshot(eur, 100)));
        assert!(!filter.matches(&snapshot(eur, 101)));
        assert!(!filter.matches(&snapshot(gbp, 100)));
        assert!(SnapshotFilter::all().matches(&snapshot(gbp, 5)));
    }
}
