//! HTTP rates source.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use fxrates_common::IngestRequest;
use fxrates_engine::{FxError, FxResult, RatesSource};
use reqwest::Client;
use tracing::debug;

use crate::config::SyncConfig;

const SOURCE_NAME: &str = "http";

/// Fetches `{timestamp, base, rates}` payloads from a latest-rates endpoint.
pub struct HttpSource {
    client: Client,
    url_template: String,
    app_id: String,
}

impl HttpSource {
    /// Create a new HTTP source from sync settings.
    pub fn new(config: &SyncConfig) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| source_error(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url_template: config.source_url.clone(),
            app_id: config.app_id.clone(),
        })
    }

    /// Endpoint for the given day.
    fn endpoint(&self, date: NaiveDate) -> String {
        self.url_template
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
    }
}

#[async_trait]
impl RatesSource for HttpSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self) -> FxResult<IngestRequest> {
        let url = self.endpoint(Utc::now().date_naive());
        debug!(url = %url, "Fetching rates");

        let response = self
            .client
            .get(&url)
            .query(&[("app_id", self.app_id.as_str())])
            .send()
            .await
            .map_err(|e| source_error(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(source_error(format!("unexpected status {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| source_error(format!("Failed to read body: {}", e)))?;

        parse_payload(&body)
    }
}

/// Decode a payload. Extra fields such as `disclaimer` are ignored.
fn parse_payload(body: &[u8]) -> FxResult<IngestRequest> {
    serde_json::from_slice(body).map_err(|e| source_error(format!("JSON parse error: {}", e)))
}

fn source_error(reason: String) -> FxError {
    FxError::Source {
        source_name: SOURCE_NAME.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxrates_engine::ErrorKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_endpoint_substitutes_date() {
        let source = HttpSource::new(&SyncConfig::default()).unwrap();
        let date = NaiveDate::from_ymd_opt(2023, 11, 14).unwrap();

        assert_eq!(
            source.endpoint(date),
            "https://openexchangerates.org/api/historical/2023-11-14.json"
        );
    }

    #[test]
    fn test_parse_payload() {
        let body = br#"{
            "disclaimer": "Usage subject to terms",
            "license": "https://openexchangerates.org/license",
            "timestamp": 1700000000,
            "base": "USD",
            "rates": {"EUR": 0.92, "GBP": 0.79, "JPY": 151.7}
        }"#;

        let request = parse_payload(body).unwrap();

        assert_eq!(request.timestamp, 1_700_000_000);
        assert_eq!(request.base, "USD");
        assert_eq!(request.rates["EUR"], dec!(0.92));
        assert_eq!(request.rates["JPY"], dec!(151.7));
    }

    #[test]
    fn test_parse_garbage_is_upstream_error() {
        let err = parse_payload(b"<html>rate limited</html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }
}
