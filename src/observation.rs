use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::ResolveError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper-case ISO 4217 style code, always three ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let code = raw.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ResolveError::InvalidInput(
                "Invalid currency codes. Use 3-letter codes (e.g., USD, EUR)".to_string(),
            ));
        }

        Ok(CurrencyCode(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates a set of raw codes. Duplicates collapse, order is by code.
pub fn parse_currencies<I, S>(raw: I) -> Result<BTreeSet<CurrencyCode>, ResolveError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let currencies = raw
        .into_iter()
        .map(|code| CurrencyCode::parse(code.as_ref()))
        .collect::<Result<BTreeSet<_>, _>>()?;

    if currencies.is_empty() {
        return Err(ResolveError::InvalidInput(
            "At least one currency is required".to_string(),
        ));
    }

    Ok(currencies)
}

/// Splits a comma separated query parameter, skipping blank entries.
pub fn split_currency_list(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .collect()
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, ResolveError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        ResolveError::InvalidInput("Invalid date format. Use YYYY-MM-DD".to_string())
    })
}

/// One published rate of `currency` against EUR.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub currency: CurrencyCode,
    pub date: NaiveDate,
    pub rate: Decimal,
}

/// Inclusive date range requested from the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl FetchWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ResolveError> {
        if start > end {
            return Err(ResolveError::InvalidInput(format!(
                "Start date {} is after end date {}",
                start, end
            )));
        }

        Ok(FetchWindow { start, end })
    }

    /// From January 1st of `date`'s year up to and including `date`.
    pub fn year_to_date(date: NaiveDate) -> Self {
        let start = date.with_ordinal(1).unwrap_or(date);
        FetchWindow { start, end: date }
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
