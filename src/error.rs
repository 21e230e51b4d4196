use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::observation::CurrencyCode;

/// Code returned for malformed requests.
pub const INVALID_INPUT_CODE: i32 = -2;
/// Code returned whenever the requested data is not available.
pub const NO_DATA_CODE: i32 = -1;

/// Failures of the upstream statistical data API.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Request to the ECB data API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("ECB data API returned status {status}")]
    Status { status: u16 },

    #[error("ECB data API has temporarily blocked access (too many requests)")]
    Blocked,

    #[error("Local rate limit exceeded for ECB calls")]
    RateLimited,

    #[error("Malformed CSV payload: {0}")]
    Malformed(String),

    #[error("ECB data API did not answer within {0:?}")]
    Timeout(Duration),
}

impl UpstreamError {
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport(_) => true,
            UpstreamError::Status { status } => matches!(status, 502 | 503 | 504),
            _ => false,
        }
    }
}

/// Every way a rate query can fail.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("No data available from ECB API: {0}")]
    UpstreamUnavailable(String),

    #[error("No data for currencies: {}", join_codes(.0))]
    NoDataForCurrencies(Vec<CurrencyCode>),

    #[error("No data available for date {0} or earlier")]
    NoDataOnOrBeforeDate(NaiveDate),
}

impl ResolveError {
    pub fn code(&self) -> i32 {
        match self {
            ResolveError::InvalidInput(_) => INVALID_INPUT_CODE,
            _ => NO_DATA_CODE,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, ResolveError::InvalidInput(_))
    }
}

/// Keeps upstream details (URLs, transport errors) out of client messages.
impl From<UpstreamError> for ResolveError {
    fn from(err: UpstreamError) -> Self {
        let reason = match err {
            UpstreamError::Blocked | UpstreamError::RateLimited => {
                "too many requests, try again in a few minutes"
            }
            UpstreamError::Timeout(_) => "request timed out",
            UpstreamError::Malformed(_) => "unreadable response",
            UpstreamError::Transport(_) | UpstreamError::Status { .. } => "request failed",
        };
        ResolveError::UpstreamUnavailable(reason.to_string())
    }
}

fn join_codes(codes: &[CurrencyCode]) -> String {
    codes
        .iter()
        .map(CurrencyCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
