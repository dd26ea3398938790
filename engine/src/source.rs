//! Rates source trait and a fixed-payload implementation.

use async_trait::async_trait;
use fxrates_common::IngestRequest;

use crate::error::FxResult;

/// Trait for upstream rate feeds.
#[async_trait]
pub trait RatesSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Fetch the current payload.
    async fn fetch(&self) -> FxResult<IngestRequest>;
}

/// Source serving a payload set by the caller.
#[cfg(any(test, feature = "test-utils"))]
pub struct StaticSource {
    name: String,
    payload: parking_lot::Mutex<Option<IngestRequest>>,
    fetches: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl StaticSource {
    /// Create a source with no payload; fetching fails until one is set.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: parking_lot::Mutex::new(None),
            fetches: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Set or clear the payload served by `fetch`.
    pub fn set_payload(&self, payload: Option<IngestRequest>) {
        *self.payload.lock() = payload;
    }

    /// Number of `fetch` calls so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RatesSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> FxResult<IngestRequest> {
        self.fetches
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.payload
            .lock()
            .clone()
            .ok_or_else(|| crate::error::FxError::Source {
                source_name: self.name.clone(),
                reason: "no payload configured".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticSource::new("static");

        let err = source.fetch().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);

        let payload = IngestRequest::new(1_700_000_000, "USD").with_rate("EUR", dec!(0.92));
        source.set_payload(Some(payload.clone()));

        assert_eq!(source.fetch().await.unwrap(), payload);
        assert_eq!(source.fetches(), 2);
        assert_eq!(source.name(), "static");
    }
}
