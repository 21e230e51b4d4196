use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::UpstreamError;
use crate::observation::{CurrencyCode, DATE_FORMAT, Observation};

const REQUIRED_COLUMNS: [&str; 3] = ["CURRENCY", "TIME_PERIOD", "OBS_VALUE"];

/// A row of the ECB `csvdata` format. Columns not listed here are ignored.
#[derive(Debug, Deserialize, PartialEq)]
pub struct SeriesRow {
    #[serde(rename = "CURRENCY")]
    pub currency: String,
    #[serde(rename = "TIME_PERIOD")]
    pub time_period: String,
    #[serde(rename = "OBS_VALUE")]
    pub obs_value: String,
}

impl SeriesRow {
    fn to_observation(&self) -> Option<Observation> {
        let currency = CurrencyCode::parse(&self.currency).ok()?;
        let date = chrono::NaiveDate::parse_from_str(self.time_period.trim(), DATE_FORMAT).ok()?;
        let rate = Decimal::from_str(self.obs_value.trim()).ok()?;

        Some(Observation {
            currency,
            date,
            rate,
        })
    }
}

/// Parses a `csvdata` payload. Rows that fail to parse are dropped, a
/// payload without the expected columns is rejected as a whole.
pub fn parse_observations(body: &str) -> Result<Vec<Observation>, UpstreamError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| UpstreamError::Malformed(e.to_string()))?;
    if let Some(missing) = REQUIRED_COLUMNS
        .iter()
        .find(|column| !headers.iter().any(|h| h == **column))
    {
        return Err(UpstreamError::Malformed(format!("missing column {}", missing)));
    }

    let mut observations = Vec::new();
    let mut dropped = 0usize;
    for row in reader.deserialize::<SeriesRow>() {
        match row.ok().as_ref().and_then(SeriesRow::to_observation) {
            Some(observation) => observations.push(observation),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        log::debug!("Dropped {} unparseable rows from ECB payload", dropped);
    }

    Ok(observations)
}
