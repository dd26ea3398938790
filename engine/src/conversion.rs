//! Cross-rate conversion and rebasing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fxrates_common::{now, CurrencyCode, Money, RateSnapshot};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{FxError, FxResult};
use crate::metrics::EngineMetrics;
use crate::rate_store::RateStore;

/// Represents a completed conversion.
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    /// Unique conversion ID.
    pub id: Uuid,
    /// Input amount.
    pub input: Money,
    /// Output amount, unrounded.
    pub output: Money,
    /// Latest snapshot of the source currency.
    pub from_rate: RateSnapshot,
    /// Latest snapshot of the target currency.
    pub to_rate: RateSnapshot,
    /// When the conversion was executed.
    pub executed_at: DateTime<Utc>,
}

impl Conversion {
    /// Get the effective rate used.
    pub fn effective_rate(&self) -> Decimal {
        if self.input.value.is_zero() {
            return Decimal::ZERO;
        }
        self.output.value / self.input.value
    }

    /// Output rounded to the target currency's standard decimal places.
    pub fn rounded(&self) -> Money {
        self.output.round()
    }
}

/// `(amount / from_rate) * to_rate`, with overflow reported instead of panicking.
pub fn cross_convert(amount: Decimal, from_rate: Decimal, to_rate: Decimal) -> FxResult<Decimal> {
    amount
        .checked_div(from_rate)
        .and_then(|units| units.checked_mul(to_rate))
        .ok_or_else(|| {
            FxError::InvalidArgument(format!(
                "conversion of {} at {} -> {} overflows",
                amount, from_rate, to_rate
            ))
        })
}

/// Computes conversions from the latest known snapshots.
pub struct ConversionEngine {
    rates: Arc<RateStore>,
    metrics: Arc<EngineMetrics>,
    verify_shared_base: bool,
}

impl ConversionEngine {
    pub fn new(rates: Arc<RateStore>, metrics: Arc<EngineMetrics>) -> Self {
        Self {
            rates,
            metrics,
            verify_shared_base: true,
        }
    }

    /// Toggle the check that both snapshots were quoted against the same base.
    pub fn with_shared_base_check(mut self, enabled: bool) -> Self {
        self.verify_shared_base = enabled;
        self
    }

    /// Convert `amount` of `from` into `to`.
    #[instrument(skip(self, amount), fields(amount = %amount))]
    pub async fn convert(&self, from: &str, to: &str, amount: Decimal) -> FxResult<Conversion> {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(FxError::InvalidArgument(
                "both currency codes are required".to_string(),
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(FxError::InvalidArgument(format!(
                "amount must be positive, got {}",
                amount
            )));
        }

        let from = CurrencyCode::parse(from)?;
        let to = CurrencyCode::parse(to)?;

        let from_rate = self.rates.latest_for(&from).await?;
        let to_rate = self.rates.latest_for(&to).await?;

        if self.verify_shared_base && from_rate.base_currency_id != to_rate.base_currency_id {
            return Err(FxError::BaseMismatch {
                from,
                from_base: from_rate.base_currency_id,
                to,
                to_base: to_rate.base_currency_id,
            });
        }

        let value = cross_convert(amount, from_rate.rate, to_rate.rate)?;
        self.metrics.conversion();
        debug!(from = %from, to = %to, output = %value, "Conversion computed");

        Ok(Conversion {
            id: Uuid::now_v7(),
            input: Money::new(amount, from),
            output: Money::new(value, to),
            from_rate,
            to_rate,
            executed_at: now(),
        })
    }

    /// Express `snapshots` relative to `target`'s latest rate.
    ///
    /// Elements quoting `target` itself are returned unchanged. Only the
    /// rate is rewritten; base ids still name the original base.
    #[instrument(skip(self, snapshots), fields(snapshots = snapshots.len()))]
    pub async fn rebase(
        &self,
        snapshots: Vec<RateSnapshot>,
        target: &str,
    ) -> FxResult<Vec<RateSnapshot>> {
        if target.trim().is_empty() {
            return Err(FxError::InvalidArgument(
                "target base code is required".to_string(),
            ));
        }
        let target = CurrencyCode::parse(target)?;
        let base_rate = self.rates.latest_for(&target).await?;

        let rebased = snapshots
            .into_iter()
            .map(|mut snapshot| -> FxResult<RateSnapshot> {
                if snapshot.currency_id != base_rate.currency_id {
                    snapshot.rate = snapshot.rate.checked_div(base_rate.rate).ok_or_else(|| {
                        FxError::InvalidArgument(format!(
                            "rebasing {} by {} overflows",
                            snapshot.rate, base_rate.rate
                        ))
                    })?;
                }
                Ok(snapshot)
            })
            .collect::<FxResult<Vec<_>>>()?;

        self.metrics.rebase();
        Ok(rebased)
    }
}
