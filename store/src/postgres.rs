//! PostgreSQL store on a `sqlx` connection pool.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fxrates_common::{
    Currency, CurrencyCode, CurrencyId, NewSnapshot, RateSnapshot, SnapshotId, SnapshotKey,
    StoreError, StoreResult,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::repository::{CurrencyRepository, SnapshotFilter, SnapshotRepository, TimeWindow};

/// Schema statements, applied in order. Every statement is idempotent.
const MIGRATIONS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS currencies (
        id   UUID PRIMARY KEY,
        code VARCHAR(3) NOT NULL UNIQUE,
        name VARCHAR(100)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS exchange_rates (
        id               UUID PRIMARY KEY,
        currency_id      UUID NOT NULL REFERENCES currencies (id),
        base_currency_id UUID NOT NULL REFERENCES currencies (id),
        rate             NUMERIC NOT NULL CHECK (rate > 0),
        ts               TIMESTAMPTZ NOT NULL,
        CONSTRAINT exchange_rates_key UNIQUE (currency_id, base_currency_id, ts)
    )"#,
    r#"CREATE INDEX IF NOT EXISTS exchange_rates_latest_idx
        ON exchange_rates (currency_id, ts DESC)"#,
];

const SNAPSHOT_COLUMNS: &str = "id, currency_id, base_currency_id, rate, ts";

/// Connection settings for [`PgStore`].
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    /// Database URL.
    pub url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// How long a call may wait for a pooled connection.
    pub acquire_timeout: Duration,
}

impl PgStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

impl Default for PgStoreConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/fxrates".to_string(),
            max_connections: 25,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

/// Store backed by PostgreSQL.
///
/// Uniqueness of currency codes and of snapshot keys is enforced by the
/// schema; concurrent writers are merged with `ON CONFLICT` clauses.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool against the configured database.
    #[instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn connect(config: &PgStoreConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| map_sqlx("connect", e))?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing.
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in MIGRATIONS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx("migrate", e))?;
        }
        info!(statements = MIGRATIONS.len(), "Database migrations completed");
        Ok(())
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CurrencyRepository for PgStore {
    async fn find_by_code(&self, code: &CurrencyCode) -> StoreResult<Option<Currency>> {
        let row = sqlx::query_as::<_, CurrencyRow>(
            "SELECT id, code, name FROM currencies WHERE code = $1",
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find currency", e))?;

        row.map(Currency::try_from).transpose()
    }

    async fn create(&self, code: &CurrencyCode, name: Option<&str>) -> StoreResult<Currency> {
        let proposed = CurrencyId::new();
        let inserted = sqlx::query(
            "INSERT INTO currencies (id, code, name) VALUES ($1, $2, $3) \
             ON CONFLICT (code) DO NOTHING",
        )
        .bind(*proposed.as_uuid())
        .bind(code.as_str())
        .bind(name)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx("create currency", e))?
        .rows_affected();

        debug!(code = %code, inserted = inserted == 1, "Currency insert attempted");

        // Read back whatever won; the proposed id is only final if it did.
        self.find_by_code(code)
            .await?
            .ok_or_else(|| StoreError::Unavailable(format!("currency {} vanished after insert", code)))
    }

    async fn set_name(&self, code: &CurrencyCode, name: Option<&str>) -> StoreResult<Currency> {
        let row = sqlx::query_as::<_, CurrencyRow>(
            "UPDATE currencies SET name = $2 WHERE code = $1 RETURNING id, code, name",
        )
        .bind(code.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("rename currency", e))?;

        row.map(Currency::try_from)
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("currency {}", code)))
    }

    async fn list(&self) -> StoreResult<Vec<Currency>> {
        sqlx::query_as::<_, CurrencyRow>("SELECT id, code, name FROM currencies ORDER BY code ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("list currencies", e))?
            .into_iter()
            .map(Currency::try_from)
            .collect()
    }
}

#[async_trait]
impl SnapshotRepository for PgStore {
    async fn upsert(&self, snapshot: NewSnapshot) -> StoreResult<RateSnapshot> {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO exchange_rates (id, currency_id, base_currency_id, rate, ts) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (currency_id, base_currency_id, ts) DO UPDATE SET rate = EXCLUDED.rate \
             RETURNING id",
        )
        .bind(*SnapshotId::new().as_uuid())
        .bind(*snapshot.currency_id.as_uuid())
        .bind(*snapshot.base_currency_id.as_uuid())
        .bind(snapshot.rate)
        .bind(snapshot.timestamp)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx("upsert snapshot", e))?;

        Ok(RateSnapshot::confirmed(SnapshotId::from_uuid(id), snapshot))
    }

    async fn get(&self, key: &SnapshotKey) -> StoreResult<Option<RateSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM exchange_rates \
             WHERE currency_id = $1 AND base_currency_id = $2 AND ts = $3"
        ))
        .bind(*key.currency_id.as_uuid())
        .bind(*key.base_currency_id.as_uuid())
        .bind(key.timestamp)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("get snapshot", e))?;

        Ok(row.map(RateSnapshot::from))
    }

    async fn find(&self, filter: &SnapshotFilter) -> StoreResult<Vec<RateSnapshot>> {
        let mut query = snapshot_query(filter);
        let rows = query
            .build_query_as::<SnapshotRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx("find snapshots", e))?;

        debug!(rows = rows.len(), "Snapshot query completed");
        Ok(rows.into_iter().map(RateSnapshot::from).collect())
    }

    async fn latest(&self, currency_id: CurrencyId) -> StoreResult<Option<RateSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM exchange_rates \
             WHERE currency_id = $1 ORDER BY ts DESC LIMIT 1"
        ))
        .bind(*currency_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("latest snapshot", e))?;

        Ok(row.map(RateSnapshot::from))
    }

    async fn count(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exchange_rates")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx("count snapshots", e))?;
        Ok(count.max(0) as u64)
    }
}

fn snapshot_query(filter: &SnapshotFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!(
        "SELECT {SNAPSHOT_COLUMNS} FROM exchange_rates WHERE TRUE"
    ));

    if let Some(currency_id) = filter.currency_id {
        query.push(" AND currency_id = ").push_bind(*currency_id.as_uuid());
    }

    match filter.window {
        TimeWindow::Any => {}
        TimeWindow::At(ts) => {
            query.push(" AND ts = ").push_bind(ts);
        }
        TimeWindow::Between { start, end } => {
            query
                .push(" AND ts BETWEEN ")
                .push_bind(start)
                .push(" AND ")
                .push_bind(end);
        }
    }

    query.push(" ORDER BY ts ASC, currency_id ASC");
    query
}

/// Map a driver error into the boundary error, keeping the operation name.
fn map_sqlx(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound(operation.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(format!("{}: {}", operation, db.message()))
        }
        decode @ (sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
            StoreError::InvalidData(format!("{}: {}", operation, decode))
        }
        other => StoreError::Unavailable(format!("{}: {}", operation, other)),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CurrencyRow {
    id: Uuid,
    code: String,
    name: Option<String>,
}

impl TryFrom<CurrencyRow> for Currency {
    type Error = StoreError;

    fn try_from(row: CurrencyRow) -> Result<Self, Self::Error> {
        let code = CurrencyCode::parse(&row.code)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        Ok(Currency {
            id: CurrencyId::from_uuid(row.id),
            code,
            name: row.name.filter(|n| !n.is_empty()),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    id: Uuid,
    currency_id: Uuid,
    base_currency_id: Uuid,
    rate: Decimal,
    ts: DateTime<Utc>,
}

impl From<SnapshotRow> for RateSnapshot {
    fn from(row: SnapshotRow) -> Self {
        RateSnapshot {
            id: SnapshotId::from_uuid(row.id),
            currency_id: CurrencyId::from_uuid(row.currency_id),
            base_currency_id: CurrencyId::from_uuid(row.base_currency_id),
            rate: row.rate,
            timestamp: row.ts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxrates_common::from_unix_seconds;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = map_sqlx("latest snapshot", sqlx::Error::RowNotFound);
        assert_eq!(err, StoreError::NotFound("latest snapshot".to_string()));
    }

    #[test]
    fn test_pool_timeout_maps_to_unavailable() {
        let err = map_sqlx("upsert snapshot", sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_currency_row_normalizes_empty_name() {
        let row = CurrencyRow {
            id: Uuid::now_v7(),
            code: "EUR".to_string(),
            name: Some(String::new()),
        };
        let currency = Currency::try_from(row).unwrap();
        assert_eq!(currency.code, CurrencyCode::eur());
        assert_eq!(currency.name, None);
    }

    #[test]
    fn test_currency_row_rejects_bad_code() {
        let row = CurrencyRow {
            id: Uuid::now_v7(),
            code: "E1".to_string(),
            name: None,
        };
        assert!(matches!(
            Currency::try_from(row),
            Err(StoreError::InvalidData(_))
        ));
    }

    #[test]
    fn test_snapshot_query_sql() {
        let filter = SnapshotFilter::all()
            .for_currency(CurrencyId::new())
            .within(TimeWindow::Between {
                start: from_unix_seconds(100).unwrap(),
                end: from_unix_seconds(200).unwrap(),
            });
        let query = snapshot_query(&filter);

        assert_eq!(
            query.sql(),
            "SELECT id, currency_id, base_currency_id, rate, ts FROM exchange_rates WHERE TRUE \
             AND currency_id = $1 AND ts BETWEEN $2 AND $3 ORDER BY ts ASC, currency_id ASC"
        );
    }

    #[test]
    fn test_default_config() {
        let config = PgStoreConfig::new("postgres://db/rates");
        assert_eq!(config.url, "postgres://db/rates");
        assert_eq!(config.max_connections, 25);
    }
}
