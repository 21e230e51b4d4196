use actix_web::error::{InternalError, QueryPayloadError};
use actix_web::{HttpRequest, HttpResponse, get, web};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::error::{INVALID_INPUT_CODE, NO_DATA_CODE, ResolveError};
use crate::observation::{parse_date, split_currency_list};
use crate::resolver::{RateResolver, Resolution};
use crate::response::{ErrorBody, HealthBody, HistoryBody, RatesBody};

/// Shared state of the HTTP handlers.
pub struct AppState {
    pub resolver: RateResolver,
    pub default_currencies: Vec<String>,
    today: fn() -> NaiveDate,
}

impl AppState {
    pub fn new(resolver: RateResolver, default_currencies: Vec<String>) -> Self {
        Self {
            resolver,
            default_currencies,
            today: utc_today,
        }
    }

    /// Replaces the clock used when a request carries no date.
    pub fn with_today(mut self, today: fn() -> NaiveDate) -> Self {
        self.today = today;
        self
    }
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug, Deserialize)]
pub struct ExchangeParams {
    currencies: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    currencies: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(query_error))
        .service(index)
        .service(health)
        .service(history)
        .service(exchange)
        .default_service(web::to(not_found));
}

#[get("/api")]
async fn index() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "service": "BCE Exchange Rates API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "GET /api/health",
            "rates": "GET /api/bce-exchange?currencies=USD,CHF&date=2025-12-04",
            "history": concat!(
                "GET /api/bce-exchange/history",
                "?currencies=USD,CHF&start=2025-11-01&end=2025-12-04"
            ),
        }
    }))
}

#[get("/api/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthBody::ok())
}

#[get("/api/bce-exchange")]
async fn exchange(state: web::Data<AppState>, params: web::Query<ExchangeParams>) -> HttpResponse {
    match exchange_rates(&state, &params).await {
        Ok(resolution) => {
            if resolution.fallback_used() {
                for rate in &resolution.rates {
                    log::info!(
                        "No {} rate for {}, using {}",
                        rate.currency,
                        resolution.requested_date,
                        rate.effective_date
                    );
                }
            }
            HttpResponse::Ok().json(RatesBody::from(&resolution))
        }
        Err(err) => error_response(&err),
    }
}

async fn exchange_rates(
    state: &AppState,
    params: &ExchangeParams,
) -> Result<Resolution, ResolveError> {
    let requested_date = match params.date.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => (state.today)(),
    };
    let currencies = params.currencies.as_deref().ok_or_else(|| {
        ResolveError::InvalidInput("currencies parameter is required".to_string())
    })?;

    state
        .resolver
        .resolve(split_currency_list(currencies), requested_date)
        .await
}

#[get("/api/bce-exchange/history")]
async fn history(state: web::Data<AppState>, params: web::Query<HistoryParams>) -> HttpResponse {
    match history_points(&state, &params).await {
        Ok(body) => HttpResponse::Ok().json(body),
        Err(err) => error_response(&err),
    }
}

async fn history_points(
    state: &AppState,
    params: &HistoryParams,
) -> Result<HistoryBody, ResolveError> {
    let (start, end) = match (params.start.as_deref(), params.end.as_deref()) {
        (Some(start), Some(end)) => (parse_date(start)?, parse_date(end)?),
        _ => {
            return Err(ResolveError::InvalidInput(
                "Parameters \"start\" and \"end\" are required".to_string(),
            ));
        }
    };

    let observations = match params.currencies.as_deref() {
        Some(raw) => {
            state
                .resolver
                .history(split_currency_list(raw), start, end)
                .await?
        }
        None => {
            state
                .resolver
                .history(&state.default_currencies, start, end)
                .await?
        }
    };

    Ok(HistoryBody::new(start, end, &observations))
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorBody {
        status: "error",
        code: NO_DATA_CODE,
        message: "Not found".to_string(),
    })
}

/// Query strings serde cannot read (e.g. a repeated parameter) still get
/// the JSON error body.
fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    log::debug!("Rejected query string: {}", err);
    let body = ErrorBody {
        status: "error",
        code: INVALID_INPUT_CODE,
        message: format!("Invalid query string: {}", err),
    };
    InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
}

fn error_response(err: &ResolveError) -> HttpResponse {
    if err.is_client_error() {
        log::debug!("Rejected request: {}", err);
        HttpResponse::BadRequest().json(ErrorBody::from(err))
    } else {
        log::info!("No data: {}", err);
        HttpResponse::NotFound().json(ErrorBody::from(err))
    }
}
