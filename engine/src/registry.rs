//! Currency identity resolution.

use std::sync::Arc;

use fxrates_common::{Currency, CurrencyCode, StoreError};
use fxrates_store::CurrencyRepository;
use tracing::{debug, info, instrument, warn};

use crate::error::{FxError, FxResult};

/// Maps currency codes to store-allocated identities, creating them on
/// first sight.
///
/// The registry never locks. Two callers resolving the same new code race
/// on the store's unique constraint; the loser re-fetches the winner's
/// record, so both observe the same identity.
pub struct CurrencyRegistry {
    repo: Arc<dyn CurrencyRepository>,
}

impl CurrencyRegistry {
    /// Create a registry over the given repository.
    pub fn new(repo: Arc<dyn CurrencyRepository>) -> Self {
        Self { repo }
    }

    /// Resolve a raw code, creating the currency if it does not exist.
    pub async fn resolve(&self, code: &str) -> FxResult<Currency> {
        let code = CurrencyCode::parse(code)?;
        self.resolve_code(&code).await
    }

    /// Resolve an already normalized code.
    #[instrument(skip(self), fields(code = %code))]
    pub async fn resolve_code(&self, code: &CurrencyCode) -> FxResult<Currency> {
        match self.repo.find_by_code(code).await {
            Ok(Some(currency)) => return Ok(currency),
            Ok(None) => debug!("Currency not found, creating"),
            Err(e) => warn!(error = %e, "Currency lookup failed, attempting creation"),
        }

        match self.repo.create(code, None).await {
            Ok(currency) => {
                info!(currency_id = %currency.id, "Currency resolved");
                Ok(currency)
            }
            Err(StoreError::Conflict(reason)) => {
                warn!(reason = %reason, "Lost currency creation race, re-fetching");
                self.refetch_after_conflict(code, reason).await
            }
            Err(source) => Err(FxError::NotFoundOrCreateFailed {
                code: code.clone(),
                source,
            }),
        }
    }

    async fn refetch_after_conflict(
        &self,
        code: &CurrencyCode,
        reason: String,
    ) -> FxResult<Currency> {
        match self.repo.find_by_code(code).await {
            Ok(Some(currency)) => Ok(currency),
            Ok(None) => Err(FxError::Conflict(format!(
                "currency {} conflicted on creation but is not readable: {}",
                code, reason
            ))),
            Err(source) => Err(FxError::NotFoundOrCreateFailed {
                code: code.clone(),
                source,
            }),
        }
    }

    /// Look up a currency without creating it.
    pub async fn find(&self, code: &CurrencyCode) -> FxResult<Option<Currency>> {
        self.repo
            .find_by_code(code)
            .await
            .map_err(|e| FxError::store(format!("find currency {}", code), e))
    }

    /// All currencies sorted by code ascending.
    pub async fn list_all(&self) -> FxResult<Vec<Currency>> {
        self.repo
            .list()
            .await
            .map_err(|e| FxError::store("list currencies", e))
    }

    /// Set or clear the display name of a known currency.
    #[instrument(skip(self))]
    pub async fn rename(&self, code: &str, name: Option<&str>) -> FxResult<Currency> {
        let code = CurrencyCode::parse(code)?;
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        if name.map_or(false, |n| n.chars().count() > 100) {
            return Err(FxError::InvalidArgument(
                "currency name longer than 100 characters".to_string(),
            ));
        }

        self.repo
            .set_name(&code, name)
            .await
            .map_err(|e| FxError::store(format!("rename currency {}", code), e))
    }
}
