//! Rate snapshots and the raw ingestion payload.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::identifiers::{CurrencyId, SnapshotId};
use crate::time::Timestamp;

/// Logical identity of a snapshot. At most one persisted record per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub currency_id: CurrencyId,
    pub base_currency_id: CurrencyId,
    pub timestamp: Timestamp,
}

/// A snapshot that has not been confirmed by the store yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    /// Currency being quoted.
    pub currency_id: CurrencyId,
    /// Currency the rate is expressed against.
    pub base_currency_id: CurrencyId,
    /// Units of the quoted currency per one unit of the base. Always positive.
    pub rate: Decimal,
    /// Observation time, second precision.
    pub timestamp: Timestamp,
}

impl NewSnapshot {
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            currency_id: self.currency_id,
            base_currency_id: self.base_currency_id,
            timestamp: self.timestamp,
        }
    }
}

/// One recorded rate between a currency and a base currency at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub id: SnapshotId,
    pub currency_id: CurrencyId,
    pub base_currency_id: CurrencyId,
    pub rate: Decimal,
    pub timestamp: Timestamp,
}

impl RateSnapshot {
    /// Attach a store-confirmed identity to a pending snapshot.
    pub fn confirmed(id: SnapshotId, snapshot: NewSnapshot) -> Self {
        Self {
            id,
            currency_id: snapshot.currency_id,
            base_currency_id: snapshot.base_currency_id,
            rate: snapshot.rate,
            timestamp: snapshot.timestamp,
        }
    }

    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            currency_id: self.currency_id,
            base_currency_id: self.base_currency_id,
            timestamp: self.timestamp,
        }
    }
}

/// Raw periodic payload: `{timestamp, base, rates: {code: number}}`.
///
/// Codes are kept exactly as received; normalization happens at ingestion.
/// Rate numbers are parsed straight into [`Decimal`], never through `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Base currency code.
    #[serde(alias = "base_code")]
    pub base: String,
    /// Currency code to rate against the base.
    pub rates: BTreeMap<String, Decimal>,
}

impl IngestRequest {
    /// Create a request with no rates.
    pub fn new(timestamp: i64, base: impl Into<String>) -> Self {
        Self {
            timestamp,
            base: base.into(),
            rates: BTreeMap::new(),
        }
    }

    /// Add a rate (builder style).
    pub fn with_rate(mut self, code: impl Into<String>, rate: Decimal) -> Self {
        self.rates.insert(code.into(), rate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn test_payload_numbers_parse_exactly() {
        let json = r#"{"timestamp":1700000000,"base":"USD","rates":{"EUR":0.92,"GBP":0.79}}"#;
        let request: IngestRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.timestamp, 1_700_000_000);
        assert_eq!(request.base, "USD");
        assert_eq!(request.rates.get("EUR"), Some(&dec!(0.92)));
        assert_eq!(request.rates.get("GBP"), Some(&dec!(0.79)));
    }

    #[test]
    fn test_long_rate_keeps_every_digit() {
        let json =
            r#"{"timestamp":1700000000,"base":"USD","rates":{"BTC":0.000016123456789012345678}}"#;
        let request: IngestRequest = serde_json::from_str(json).unwrap();

        assert_eq!(
            request.rates.get("BTC"),
            Some(&Decimal::from_str("0.000016123456789012345678").unwrap())
        );
    }

    #[test]
    fn test_builder_matches_payload() {
        let built = IngestRequest::new(1_700_000_000, "USD")
            .with_rate("EUR", dec!(0.92))
            .with_rate("GBP", dec!(0.79));
        let json = r#"{"timestamp":1700000000,"base":"USD","rates":{"GBP":0.79,"EUR":0.92}}"#;
        let parsed: IngestRequest = serde_json::from_str(json).unwrap();

        assert_eq!(built, parsed);
    }
}
