use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::config::Config;
use crate::error::UpstreamError;
use crate::observation::{DATE_FORMAT, FetchWindow, Observation};
use crate::rate_limiter::RateLimiter;
use crate::retry::RetryConfig;
use crate::sdmx_csv::parse_observations;

/// Provider of daily EUR reference rates for every published currency.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// All observations within `window`. An empty vector means the source
    /// has nothing published for that range.
    async fn fetch_observations(
        &self,
        window: FetchWindow,
    ) -> Result<Vec<Observation>, UpstreamError>;
}

/// Client for the ECB data portal (`EXR` dataflow, CSV representation).
#[derive(Debug)]
pub struct EcbClient {
    client: Client,
    api_url: String,
    timeout: Duration,
    retry: RetryConfig,
    limiter: RateLimiter,
}

impl EcbClient {
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout(),
            retry: RetryConfig::with_max_retries(config.max_retries),
            limiter: RateLimiter::new(config.max_requests_per_minute, config.block_duration()),
        })
    }

    pub fn url_for(&self, window: FetchWindow) -> String {
        get_url(&self.api_url, window)
    }

    async fn load_csv(&self, url: &str) -> Result<Option<String>, UpstreamError> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "text/csv")
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;

        classify_response(status, text)
    }

    async fn load_csv_with_retries(&self, url: &str) -> Result<Option<String>, UpstreamError> {
        let mut attempt = 0;
        loop {
            match self.load_csv(url).await {
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    log::warn!("ECB request failed ({}), retrying in {:?}", err, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Retries included, a fetch never outlives the configured timeout.
    async fn load_csv_in_time(&self, url: &str) -> Result<Option<String>, UpstreamError> {
        tokio::time::timeout(self.timeout, self.load_csv_with_retries(url))
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl ObservationSource for EcbClient {
    async fn fetch_observations(
        &self,
        window: FetchWindow,
    ) -> Result<Vec<Observation>, UpstreamError> {
        if self.limiter.is_blocked() {
            log::warn!("ECB calls are blocked, not fetching {}", window);
            return Err(UpstreamError::RateLimited);
        }
        if !self.limiter.try_acquire() {
            return Err(UpstreamError::RateLimited);
        }

        let url = self.url_for(window);
        log::info!("Fetching from ECB: {}", url);

        let body = match self.load_csv_in_time(&url).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                log::info!("ECB has no data for {}", window);
                return Ok(Vec::new());
            }
            Err(UpstreamError::Blocked) => {
                self.limiter.block();
                return Err(UpstreamError::Blocked);
            }
            Err(err) => return Err(err),
        };

        log::info!("Received {} bytes from ECB", body.len());
        parse_observations(&body)
    }
}

fn get_url(api_url: &str, window: FetchWindow) -> String {
    format!(
        "{}?startPeriod={}&endPeriod={}&format=csvdata",
        api_url,
        window.start.format(DATE_FORMAT),
        window.end.format(DATE_FORMAT)
    )
}

/// Maps an HTTP reply to its CSV body. `Ok(None)` is the "no data" outcome.
fn classify_response(status: StatusCode, text: String) -> Result<Option<String>, UpstreamError> {
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    if !status.is_success() {
        if status == StatusCode::BAD_REQUEST && text.contains("access has been blocked") {
            return Err(UpstreamError::Blocked);
        }
        log::warn!("ECB API error {}: {}", status, text.trim());
        return Err(UpstreamError::Status {
            status: status.as_u16(),
        });
    }

    if text.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(text))
}
