use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::cache::WindowCache;
use crate::error::ResolveError;
use crate::observation::{CurrencyCode, FetchWindow, Observation, parse_currencies};
use crate::upstream::ObservationSource;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRate {
    pub currency: CurrencyCode,
    pub rate: Decimal,
    pub effective_date: NaiveDate,
}

/// Rates for a query, along with the date they were actually published on.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub requested_date: NaiveDate,
    pub effective_date: NaiveDate,
    /// Sorted by currency code, at most one entry per currency.
    pub rates: Vec<ResolvedRate>,
}

impl Resolution {
    pub fn fallback_used(&self) -> bool {
        self.effective_date != self.requested_date
    }
}

/// Answers rate queries from a cached upstream source.
pub struct RateResolver {
    source: Arc<dyn ObservationSource>,
    cache: WindowCache,
}

impl RateResolver {
    pub fn new(source: Arc<dyn ObservationSource>, cache: WindowCache) -> Self {
        Self { source, cache }
    }

    /// Rates of `currencies` on `requested_date`, or on the closest earlier
    /// date of the same year with data.
    pub async fn resolve<I, S>(
        &self,
        currencies: I,
        requested_date: NaiveDate,
    ) -> Result<Resolution, ResolveError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let currencies = parse_currencies(currencies)?;
        let window = FetchWindow::year_to_date(requested_date);
        let observations = self.observations(window).await?;

        select_rates(&observations, &currencies, requested_date)
    }

    /// Every observation of `currencies` between `start` and `end`, ordered
    /// by date then currency.
    pub async fn history<I, S>(
        &self,
        currencies: I,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, ResolveError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let currencies = parse_currencies(currencies)?;
        let window = FetchWindow::new(start, end)?;
        let observations = self.observations(window).await?;

        let mut points: Vec<Observation> = observations
            .iter()
            .filter(|o| currencies.contains(&o.currency) && o.date >= start && o.date <= end)
            .cloned()
            .collect();
        if points.is_empty() {
            return Err(ResolveError::NoDataForCurrencies(
                currencies.into_iter().collect(),
            ));
        }

        points.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.currency.cmp(&b.currency)));
        points.dedup_by(|a, b| a.date == b.date && a.currency == b.currency);

        Ok(points)
    }

    async fn observations(
        &self,
        window: FetchWindow,
    ) -> Result<Arc<Vec<Observation>>, ResolveError> {
        let observations = self
            .cache
            .get_or_fetch(self.source.as_ref(), window)
            .await
            .map_err(|err| {
                log::warn!("Upstream fetch for {} failed: {}", window, err);
                ResolveError::from(err)
            })?;

        if observations.is_empty() {
            return Err(ResolveError::UpstreamUnavailable(
                "empty response".to_string(),
            ));
        }

        Ok(observations)
    }
}

/// Picks the rates published on `requested_date`, falling back to the most
/// recent earlier date on which any of `currencies` has an observation.
/// Currencies without an observation on that date are left out.
pub fn select_rates(
    observations: &[Observation],
    currencies: &BTreeSet<CurrencyCode>,
    requested_date: NaiveDate,
) -> Result<Resolution, ResolveError> {
    let mut by_date: BTreeMap<NaiveDate, BTreeMap<&CurrencyCode, Decimal>> = BTreeMap::new();
    for observation in observations
        .iter()
        .filter(|o| currencies.contains(&o.currency))
    {
        by_date
            .entry(observation.date)
            .or_default()
            .insert(&observation.currency, observation.rate);
    }

    if by_date.is_empty() {
        return Err(ResolveError::NoDataForCurrencies(
            currencies.iter().cloned().collect(),
        ));
    }

    let (effective_date, day) = by_date
        .range(..=requested_date)
        .next_back()
        .ok_or(ResolveError::NoDataOnOrBeforeDate(requested_date))?;

    let rates = day
        .iter()
        .map(|(currency, rate)| ResolvedRate {
            currency: (*currency).clone(),
            rate: *rate,
            effective_date: *effective_date,
        })
        .collect();

    Ok(Resolution {
        requested_date,
        effective_date: *effective_date,
        rates,
    })
}
