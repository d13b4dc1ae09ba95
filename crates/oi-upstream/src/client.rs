//! HTTP client for the exchange open-interest endpoints.
//!
//! Two read endpoints are used:
//! - historical open interest (`symbol`, `period`, `limit`, optional `startTime`)
//! - current open interest (`symbol`)
//!
//! Timeouts and connection failures are retried with a linearly growing
//! delay. A non-2xx response is logged and treated as "no data this cycle".

use crate::error::{UpstreamError, UpstreamResult};
use crate::wire::{parse_current, parse_historical};
use async_trait::async_trait;
use chrono::Utc;
use oi_core::{CurrentSnapshot, HistoricalSample, Symbol};
use oi_telemetry::Metrics;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Historical request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalQuery {
    /// Period bucket, e.g. "5m".
    pub period: String,
    /// Maximum number of entries.
    pub limit: u32,
    /// Only entries at or after this timestamp (ms).
    pub start_time: Option<i64>,
}

impl HistoricalQuery {
    pub fn recent(period: impl Into<String>, limit: u32) -> Self {
        Self {
            period: period.into(),
            limit,
            start_time: None,
        }
    }

    pub fn since(mut self, start_time: i64) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

/// Source of open-interest data.
///
/// Implementations never fail: an unusable response degrades to an empty
/// result and is reported through logs.
#[async_trait]
pub trait OpenInterestSource: Send + Sync {
    /// Fetch recent historical samples, oldest first.
    async fn fetch_historical(
        &self,
        symbol: &Symbol,
        query: &HistoricalQuery,
    ) -> Vec<HistoricalSample>;

    /// Fetch the current open interest.
    async fn fetch_current(&self, symbol: &Symbol) -> Option<CurrentSnapshot>;
}

/// Client settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Historical endpoint URL.
    pub historical_url: String,
    /// Current endpoint URL.
    pub current_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
    /// Attempts per call, including the first one.
    pub max_attempts: u32,
    /// Delay unit; attempt `n` waits `n * retry_base_delay` before the next one.
    pub retry_base_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            historical_url: "https://fapi.binance.com/futures/data/openInterestHist".to_string(),
            current_url: "https://fapi.binance.com/fapi/v1/openInterest".to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

/// Endpoint label for logs and metrics.
#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Historical,
    Current,
}

impl Endpoint {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Historical => "historical",
            Self::Current => "current",
        }
    }
}

/// Client for the open-interest endpoints.
pub struct OpenInterestClient {
    /// HTTP client.
    client: Client,
    config: ClientConfig,
}

impl OpenInterestClient {
    /// Create a new client.
    pub fn new(config: ClientConfig) -> UpstreamResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| UpstreamError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch historical samples, surfacing the failure reason.
    ///
    /// Individual malformed entries are logged and dropped.
    pub async fn try_fetch_historical(
        &self,
        symbol: &Symbol,
        query: &HistoricalQuery,
    ) -> UpstreamResult<Vec<HistoricalSample>> {
        let mut params = vec![
            ("symbol", symbol.to_string()),
            ("period", query.period.clone()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(start) = query.start_time {
            params.push(("startTime", start.to_string()));
        }

        let body = self
            .get_with_retry(Endpoint::Historical, &self.config.historical_url, &params, symbol)
            .await?;

        let mut samples = Vec::new();
        for (idx, result) in parse_historical(&body, symbol)?.into_iter().enumerate() {
            match result {
                Ok(sample) => samples.push(sample),
                Err(e) => warn!(%symbol, idx, error = %e, "Dropping malformed historical entry"),
            }
        }

        debug!(%symbol, count = samples.len(), "Fetched historical open interest");
        Ok(samples)
    }

    /// Fetch the current snapshot, surfacing the failure reason.
    pub async fn try_fetch_current(&self, symbol: &Symbol) -> UpstreamResult<CurrentSnapshot> {
        let params = [("symbol", symbol.to_string())];

        let body = self
            .get_with_retry(Endpoint::Current, &self.config.current_url, &params, symbol)
            .await?;

        parse_current(&body, symbol, Utc::now())
    }

    /// GET with retry on timeout/connection failure.
    async fn get_with_retry(
        &self,
        endpoint: Endpoint,
        url: &str,
        params: &[(&str, String)],
        symbol: &Symbol,
    ) -> UpstreamResult<String> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1u32;

        loop {
            match self.get_once(url, params).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.retry_base_delay * attempt;
                    warn!(
                        %symbol,
                        endpoint = endpoint.as_str(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Upstream request failed, retrying"
                    );
                    Metrics::upstream_retry(endpoint.as_str());
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if let UpstreamError::Http { status, .. } = &e {
                        Metrics::upstream_http_error(endpoint.as_str(), *status);
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn get_once(&self, url: &str, params: &[(&str, String)]) -> UpstreamResult<String> {
        let response = self.client.get(url).query(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl OpenInterestSource for OpenInterestClient {
    async fn fetch_historical(
        &self,
        symbol: &Symbol,
        query: &HistoricalQuery,
    ) -> Vec<HistoricalSample> {
        match self.try_fetch_historical(symbol, query).await {
            Ok(samples) => samples,
            Err(UpstreamError::Http { status, body }) => {
                error!(%symbol, status, body = %body, "Historical open interest request rejected");
                Vec::new()
            }
            Err(e) => {
                error!(%symbol, error = %e, "Historical open interest request failed");
                Vec::new()
            }
        }
    }

    async fn fetch_current(&self, symbol: &Symbol) -> Option<CurrentSnapshot> {
        match self.try_fetch_current(symbol).await {
            Ok(snapshot) => Some(snapshot),
            Err(UpstreamError::Http { status, body }) => {
                error!(%symbol, status, body = %body, "Current open interest request rejected");
                None
            }
            Err(e) => {
                error!(%symbol, error = %e, "Current open interest request failed");
                None
            }
        }
    }
}
