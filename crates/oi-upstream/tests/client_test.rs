//! Open-interest client tests against a local mock exchange.
//!
//! Covers:
//! - Successful historical/current fetches
//! - Non-2xx responses (no retry, empty result)
//! - Timeouts and refused connections (retry, then empty result)

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use oi_core::Symbol;
use oi_upstream::{
    ClientConfig, HistoricalQuery, OpenInterestClient, OpenInterestSource, UpstreamError,
};
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

const HISTORICAL_BODY: &str = r#"[
    {"symbol":"BTCUSDT","sumOpenInterest":"20403.637","sumOpenInterestValue":"150570784.07","timestamp":1583127900000},
    {"symbol":"BTCUSDT","sumOpenInterest":"20401.367","sumOpenInterestValue":"149940752.14","timestamp":1583128200000}
]"#;

const CURRENT_BODY: &str = r#"{"openInterest":"10659.509","symbol":"BTCUSDT","time":1589437530011}"#;

#[derive(Clone)]
struct MockState {
    hits: Arc<AtomicUsize>,
    status: StatusCode,
    body: &'static str,
    delay: Duration,
    last_query: Arc<Mutex<HashMap<String, String>>>,
}

async fn respond(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock().await = query;
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, state.body)
}

/// Mock exchange serving both endpoints with a fixed response.
struct MockExchange {
    base_url: String,
    state: MockState,
}

impl MockExchange {
    async fn start(status: StatusCode, body: &'static str, delay: Duration) -> Self {
        let state = MockState {
            hits: Arc::new(AtomicUsize::new(0)),
            status,
            body,
            delay,
            last_query: Arc::new(Mutex::new(HashMap::new())),
        };

        let app = Router::new()
            .route("/futures/data/openInterestHist", get(respond))
            .route("/fapi/v1/openInterest", get(respond))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    fn client_config(&self) -> ClientConfig {
        config_for(&self.base_url)
    }

    fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }
}

fn config_for(base_url: &str) -> ClientConfig {
    ClientConfig {
        historical_url: format!("{base_url}/futures/data/openInterestHist"),
        current_url: format!("{base_url}/fapi/v1/openInterest"),
        request_timeout: Duration::from_secs(2),
        max_attempts: 3,
        retry_base_delay: Duration::from_millis(20),
    }
}

fn btc() -> Symbol {
    Symbol::new("BTCUSDT").unwrap()
}

#[tokio::test]
async fn test_fetch_historical_success() {
    let exchange = MockExchange::start(StatusCode::OK, HISTORICAL_BODY, Duration::ZERO).await;
    let client = OpenInterestClient::new(exchange.client_config()).unwrap();

    let query = HistoricalQuery::recent("5m", 30).since(1583127800000);
    let samples = client.fetch_historical(&btc(), &query).await;

    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].timestamp, 1583127900000);
    assert_eq!(samples[1].sum_open_interest.inner(), dec!(20401.367));
    assert_eq!(exchange.hits(), 1);

    let sent = exchange.state.last_query.lock().await.clone();
    assert_eq!(sent.get("symbol").map(String::as_str), Some("BTCUSDT"));
    assert_eq!(sent.get("period").map(String::as_str), Some("5m"));
    assert_eq!(sent.get("limit").map(String::as_str), Some("30"));
    assert_eq!(sent.get("startTime").map(String::as_str), Some("1583127800000"));
}

#[tokio::test]
async fn test_fetch_current_success() {
    let exchange = MockExchange::start(StatusCode::OK, CURRENT_BODY, Duration::ZERO).await;
    let client = OpenInterestClient::new(exchange.client_config()).unwrap();

    let snapshot = client.fetch_current(&btc()).await.unwrap();
    assert_eq!(snapshot.open_interest.inner(), dec!(10659.509));
    assert_eq!(snapshot.symbol, btc());
}

#[tokio::test]
async fn test_http_error_is_not_retried() {
    let exchange = MockExchange::start(
        StatusCode::BAD_REQUEST,
        r#"{"code":-1121,"msg":"Invalid symbol."}"#,
        Duration::ZERO,
    )
    .await;
    let client = OpenInterestClient::new(exchange.client_config()).unwrap();

    let samples = client
        .fetch_historical(&btc(), &HistoricalQuery::recent("5m", 30))
        .await;
    assert!(samples.is_empty());
    assert_eq!(exchange.hits(), 1);

    match client.try_fetch_current(&btc()).await {
        Err(UpstreamError::Http { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("Invalid symbol"));
        }
        other => panic!("expected HTTP error, got {other:?}"),
    }
    assert_eq!(exchange.hits(), 2);
}

#[tokio::test]
async fn test_timeout_is_retried_then_degrades() {
    let exchange =
        MockExchange::start(StatusCode::OK, CURRENT_BODY, Duration::from_millis(300)).await;
    let config = ClientConfig {
        request_timeout: Duration::from_millis(50),
        ..exchange.client_config()
    };
    let client = OpenInterestClient::new(config).unwrap();

    let snapshot = client.fetch_current(&btc()).await;
    assert!(snapshot.is_none());
    assert_eq!(exchange.hits(), 3);
}

#[tokio::test]
async fn test_connection_refused_retries_with_linear_delay() {
    // Grab a free port, then close it so connections are refused.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = OpenInterestClient::new(config_for(&format!("http://{addr}"))).unwrap();

    let started = Instant::now();
    let result = client
        .try_fetch_historical(&btc(), &HistoricalQuery::recent("5m", 30))
        .await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Err(UpstreamError::Connection(_))));
    // Delays of 1x and 2x the base between the three attempts.
    assert!(elapsed >= Duration::from_millis(60), "elapsed {elapsed:?}");

    // The degrading variant returns an empty result and can be called again.
    assert!(client
        .fetch_historical(&btc(), &HistoricalQuery::recent("5m", 30))
        .await
        .is_empty());
}
