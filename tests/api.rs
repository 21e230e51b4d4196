use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use async_trait::async_trait;
use chrono::NaiveDate;
use ecb_rates::api::{self, AppState};
use ecb_rates::cache::WindowCache;
use ecb_rates::error::UpstreamError;
use ecb_rates::observation::{CurrencyCode, FetchWindow, Observation};
use ecb_rates::resolver::RateResolver;
use ecb_rates::upstream::ObservationSource;
use rust_decimal::Decimal;
use serde_json::{Value, json};

struct FakeEcb {
    observations: Vec<Observation>,
    fail: bool,
    calls: AtomicUsize,
}

impl FakeEcb {
    fn new(observations: Vec<Observation>) -> Arc<Self> {
        Arc::new(Self {
            observations,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            observations: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservationSource for FakeEcb {
    async fn fetch_observations(
        &self,
        window: FetchWindow,
    ) -> Result<Vec<Observation>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(UpstreamError::Status { status: 503 });
        }
        Ok(self
            .observations
            .iter()
            .filter(|o| o.date >= window.start && o.date <= window.end)
            .cloned()
            .collect())
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn obs(currency: &str, day: NaiveDate, rate: &str) -> Observation {
    Observation {
        currency: CurrencyCode::parse(currency).unwrap(),
        date: day,
        rate: Decimal::from_str(rate).unwrap(),
    }
}

fn published() -> Vec<Observation> {
    vec![
        obs("CHF", date(2025, 12, 3), "0.9351"),
        obs("USD", date(2025, 12, 3), "1.1656"),
        obs("CHF", date(2025, 12, 4), "0.93449"),
        obs("USD", date(2025, 12, 4), "1.1666"),
        obs("GBP", date(2025, 12, 4), "0.87465"),
        obs("CHF", date(2025, 12, 5), "0.9362"),
        obs("USD", date(2025, 12, 5), "1.1645"),
    ]
}

fn state(source: Arc<FakeEcb>) -> web::Data<AppState> {
    let resolver = RateResolver::new(source, WindowCache::new(Duration::from_secs(3600)));
    let state = AppState::new(resolver, vec!["USD".to_string(), "CHF".to_string()])
        .with_today(|| NaiveDate::from_ymd_opt(2025, 12, 7).unwrap());
    web::Data::new(state)
}

async fn get(state: web::Data<AppState>, uri: &str) -> (StatusCode, Value) {
    let app = test::init_service(App::new().app_data(state).configure(api::configure)).await;
    let req = test::TestRequest::get().uri(uri).to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

#[actix_web::test]
async fn thursday_with_data_returns_requested_date() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange?currencies=CHF,USD&date=2025-12-04",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "success",
            "date": "2025-12-04",
            "date_requested": "2025-12-04",
            "rates": [
                {"currency": "CHF", "rate": 0.9345},
                {"currency": "USD", "rate": 1.1666},
            ]
        })
    );
}

#[actix_web::test]
async fn saturday_falls_back_to_friday() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange?currencies=usd&date=2025-12-06",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2025-12-05");
    assert_eq!(body["date_requested"], "2025-12-06");
    assert_eq!(body["rates"], json!([{"currency": "USD", "rate": 1.1645}]));
}

#[actix_web::test]
async fn missing_date_defaults_to_today() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange?currencies=CHF",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date_requested"], "2025-12-07");
    assert_eq!(body["date"], "2025-12-05");
}

#[actix_web::test]
async fn currency_without_data_on_effective_date_is_omitted() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange?currencies=GBP,USD&date=2025-12-05",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rates"], json!([{"currency": "USD", "rate": 1.1645}]));
}

#[actix_web::test]
async fn unknown_currency_is_not_found() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange?currencies=ZZZ&date=2025-12-04",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["code"], -1);
    assert_eq!(body["message"], "No data for currencies: ZZZ");
}

#[actix_web::test]
async fn malformed_currencies_are_rejected_without_fetching() {
    let source = FakeEcb::new(published());

    for currencies in ["", "US", "USDD", "12A", "USD,CH"] {
        let uri = format!("/api/bce-exchange?currencies={}&date=2025-12-04", currencies);
        let (status, body) = get(state(source.clone()), &uri).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{currencies:?}");
        assert_eq!(body["code"], -2);
        assert_eq!(body["status"], "error");
    }

    let (status, body) = get(state(source.clone()), "/api/bce-exchange?date=2025-12-04").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "currencies parameter is required");

    assert_eq!(source.calls(), 0);
}

#[actix_web::test]
async fn malformed_date_is_rejected() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange?currencies=USD&date=04-12-2025",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"status": "error", "code": -2, "message": "Invalid date format. Use YYYY-MM-DD"})
    );
}

#[actix_web::test]
async fn repeated_query_parameters_get_a_json_error() {
    let source = FakeEcb::new(published());

    for uri in [
        "/api/bce-exchange?currencies=USD&currencies=CHF&date=2025-12-04",
        "/api/bce-exchange?currencies=USD&date=2025-12-04&date=2025-12-05",
        "/api/bce-exchange/history?currencies=USD&start=2025-12-01&start=2025-12-02&end=2025-12-05",
    ] {
        let (status, body) = get(state(source.clone()), uri).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], -2);
        assert!(body["message"].as_str().unwrap().contains("duplicate field"));
    }

    assert_eq!(source.calls(), 0);
}

#[actix_web::test]
async fn date_before_any_publication_is_not_found() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange?currencies=USD&date=2025-01-01",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], -1);
}

#[actix_web::test]
async fn upstream_failure_is_not_found() {
    let (status, body) = get(
        state(FakeEcb::failing()),
        "/api/bce-exchange?currencies=USD&date=2025-12-04",
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], -1);
}

#[actix_web::test]
async fn repeated_queries_are_identical_and_fetch_once() {
    let source = FakeEcb::new(published());
    let app = test::init_service(
        App::new()
            .app_data(state(source.clone()))
            .configure(api::configure),
    )
    .await;

    let uri = "/api/bce-exchange?currencies=USD,CHF&date=2025-12-06";
    let request = || test::TestRequest::get().uri(uri).to_request();
    let first = test::call_and_read_body(&app, request()).await;
    let second = test::call_and_read_body(&app, request()).await;

    assert_eq!(first, second);
    assert_eq!(source.calls(), 1);
}

#[actix_web::test]
async fn history_returns_points_in_range() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange/history?currencies=CHF&start=2025-12-04&end=2025-12-05",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "success",
            "start": "2025-12-04",
            "end": "2025-12-05",
            "reference_base": "EUR",
            "data": [
                {"currency": "CHF", "date": "2025-12-04", "rate": 0.9345},
                {"currency": "CHF", "date": "2025-12-05", "rate": 0.9362},
            ]
        })
    );
}

#[actix_web::test]
async fn history_defaults_to_configured_currencies() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange/history?start=2025-12-05&end=2025-12-05",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let currencies: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["currency"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(currencies, vec!["CHF", "USD"]);
}

#[actix_web::test]
async fn history_requires_both_bounds() {
    let (status, body) = get(
        state(FakeEcb::new(published())),
        "/api/bce-exchange/history?currencies=USD&start=2025-12-01",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], -2);
}

#[actix_web::test]
async fn health_never_touches_upstream() {
    let source = FakeEcb::failing();
    let (status, body) = get(state(source.clone()), "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
    assert_eq!(source.calls(), 0);
}

#[actix_web::test]
async fn index_lists_endpoints() {
    let (status, body) = get(state(FakeEcb::new(published())), "/api").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["endpoints"]["health"], "GET /api/health");
}

#[actix_web::test]
async fn unknown_route_is_a_json_not_found() {
    let (status, body) = get(state(FakeEcb::new(published())), "/api/unknown").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "Not found");
}
