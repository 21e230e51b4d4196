use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};

use crate::error::ResolveError;
use crate::observation::{CurrencyCode, Observation};
use crate::resolver::Resolution;

pub const RATE_DECIMALS: u32 = 4;
pub const REFERENCE_BASE: &str = "EUR";

/// Rounds half-up for display. Stored rates keep full precision.
pub fn display_rate(rate: Decimal) -> Decimal {
    rate.round_dp_with_strategy(RATE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Emits a rate as a JSON number holding exactly the decimal digits shown.
fn serialize_rate<S: Serializer>(rate: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    let value: f64 = rate
        .to_string()
        .parse()
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_f64(value)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RateEntry {
    pub currency: CurrencyCode,
    #[serde(serialize_with = "serialize_rate")]
    pub rate: Decimal,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RatesBody {
    pub status: &'static str,
    pub date: NaiveDate,
    pub date_requested: NaiveDate,
    pub rates: Vec<RateEntry>,
}

impl From<&Resolution> for RatesBody {
    fn from(resolution: &Resolution) -> Self {
        RatesBody {
            status: "success",
            date: resolution.effective_date,
            date_requested: resolution.requested_date,
            rates: resolution
                .rates
                .iter()
                .map(|r| RateEntry {
                    currency: r.currency.clone(),
                    rate: display_rate(r.rate),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HistoryPoint {
    pub currency: CurrencyCode,
    pub date: NaiveDate,
    #[serde(serialize_with = "serialize_rate")]
    pub rate: Decimal,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HistoryBody {
    pub status: &'static str,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reference_base: &'static str,
    pub data: Vec<HistoryPoint>,
}

impl HistoryBody {
    pub fn new(start: NaiveDate, end: NaiveDate, observations: &[Observation]) -> Self {
        HistoryBody {
            status: "success",
            start,
            end,
            reference_base: REFERENCE_BASE,
            data: observations
                .iter()
                .map(|o| HistoryPoint {
                    currency: o.currency.clone(),
                    date: o.date,
                    rate: display_rate(o.rate),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ErrorBody {
    pub status: &'static str,
    pub code: i32,
    pub message: String,
}

impl From<&ResolveError> for ErrorBody {
    fn from(err: &ResolveError) -> Self {
        ErrorBody {
            status: "error",
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct HealthBody {
    pub status: &'static str,
}

impl HealthBody {
    pub fn ok() -> Self {
        HealthBody { status: "ok" }
    }
}
