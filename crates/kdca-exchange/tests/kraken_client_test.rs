//! KrakenClient against an in-process mock of the Kraken REST API.
//!
//! The mock records every private request and checks its `API-Sign` header
//! by recomputing the signature over the body bytes it actually received.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use kdca_core::{OrderRequest, Price, Size};
use kdca_exchange::{
    ClientConfig, Credentials, ExchangeError, KrakenClient, KrakenSigner, RetryConfig,
};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

const API_KEY: &str = "test-api-key";
const SECRET: &str =
    "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg==";

#[derive(Debug, Clone)]
struct CapturedRequest {
    method: String,
    api_key: Option<String>,
    body: String,
    signature_valid: bool,
}

/// Canned reply: HTTP status plus raw body, sent after an optional delay.
#[derive(Clone)]
struct Reply {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl Reply {
    fn ok(value: Value) -> Self {
        Self::raw(StatusCode::OK, &value.to_string())
    }

    fn raw(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        (self.status, self.body).into_response()
    }
}

#[derive(Default)]
struct MockKraken {
    tickers: Mutex<HashMap<String, Reply>>,
    private: Mutex<HashMap<String, Reply>>,
    ticker_hits: Mutex<Vec<String>>,
    captured: Mutex<Vec<CapturedRequest>>,
}

impl MockKraken {
    fn ticker(&self, pair: &str, reply: Reply) {
        self.tickers.lock().insert(pair.to_string(), reply);
    }

    fn private(&self, method: &str, reply: Reply) {
        self.private.lock().insert(method.to_string(), reply);
    }

    fn captured(&self) -> Vec<CapturedRequest> {
        self.captured.lock().clone()
    }
}

async fn ticker_handler(
    State(mock): State<Arc<MockKraken>>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    let pair = query.get("pair").cloned().unwrap_or_default();
    mock.ticker_hits.lock().push(pair.clone());
    let reply = mock
        .tickers
        .lock()
        .get(&pair)
        .cloned()
        .unwrap_or_else(|| Reply::ok(json!({"error": ["EQuery:Unknown asset pair"]})));
    tokio::time::sleep(reply.delay).await;
    reply
}

async fn private_handler(
    State(mock): State<Arc<MockKraken>>,
    Path(method): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Reply {
    let api_key = headers
        .get("API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let sent_sig = headers
        .get("API-Sign")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let nonce: u64 = body
        .split('&')
        .find_map(|kv| kv.strip_prefix("nonce="))
        .and_then(|n| n.parse().ok())
        .unwrap_or_default();
    let expected = KrakenSigner::new(SECRET)
        .unwrap()
        .sign(&format!("/0/private/{method}"), nonce, &body)
        .unwrap();

    mock.captured.lock().push(CapturedRequest {
        method: method.clone(),
        api_key,
        body,
        signature_valid: expected == sent_sig,
    });

    let reply = mock
        .private
        .lock()
        .get(&method)
        .cloned()
        .unwrap_or_else(|| Reply::ok(json!({"error": ["EGeneral:Unknown method"]})));
    tokio::time::sleep(reply.delay).await;
    reply
}

async fn start_mock() -> (Arc<MockKraken>, String) {
    let mock = Arc::new(MockKraken::default());
    let app = Router::new()
        .route("/0/public/Ticker", get(ticker_handler))
        .route("/0/private/{method}", post(private_handler))
        .with_state(mock.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (mock, format!("http://{addr}"))
}

fn client(base_url: &str, validate_only: bool) -> KrakenClient {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        retry: RetryConfig::fixed(Duration::from_millis(10), 2),
        validate_only,
    };
    KrakenClient::new(&Credentials::new(API_KEY, SECRET), config).unwrap()
}

fn impatient_client(base_url: &str) -> KrakenClient {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        timeout: Duration::from_millis(300),
        retry: RetryConfig::fixed(Duration::from_millis(10), 3),
        validate_only: false,
    };
    KrakenClient::new(&Credentials::new(API_KEY, SECRET), config).unwrap()
}

fn dca_order() -> OrderRequest {
    OrderRequest::post_only_limit_buy(
        "XXBTZEUR",
        Size::new(dec!(0.00019999)),
        Price::new(dec!(49999.62)),
    )
}

fn field<'a>(body: &'a str, key: &str) -> Option<&'a str> {
    body.split('&')
        .find_map(|kv| kv.strip_prefix(key).and_then(|rest| rest.strip_prefix('=')))
}

#[tokio::test]
async fn test_get_ticker_returns_best_bid() {
    let (mock, url) = start_mock().await;
    mock.ticker(
        "XXBTZEUR",
        Reply::ok(json!({
            "error": [],
            "result": {"XXBTZEUR": {"a": ["50001.0", "1", "1.000"], "b": ["50000.125", "3", "3.000"]}}
        })),
    );

    let ticker = client(&url, false).get_ticker("XXBTZEUR").await.unwrap();
    assert_eq!(ticker.pair, "XXBTZEUR");
    assert_eq!(ticker.best_bid, Price::new(dec!(50000.125)));
}

#[tokio::test]
async fn test_get_ticker_accepts_canonical_alias() {
    let (mock, url) = start_mock().await;
    mock.ticker(
        "XBTEUR",
        Reply::ok(json!({"error": [], "result": {"XXBTZEUR": {"b": ["42000.0", "1", "1.000"]}}})),
    );

    let ticker = client(&url, false).get_ticker("XBTEUR").await.unwrap();
    assert_eq!(ticker.best_bid, Price::new(dec!(42000.0)));
}

#[tokio::test]
async fn test_ticker_failures_are_market_data_errors() {
    let (mock, url) = start_mock().await;
    mock.ticker("ERR", Reply::ok(json!({"error": ["EQuery:Unknown asset pair"]})));
    mock.ticker("GARBAGE", Reply::raw(StatusCode::OK, "<html>not json</html>"));
    mock.ticker("EMPTY", Reply::ok(json!({"error": [], "result": {"EMPTY": {"b": []}}})));
    mock.ticker("DOWN", Reply::raw(StatusCode::BAD_GATEWAY, "bad gateway"));

    let client = client(&url, false);
    for pair in ["ERR", "GARBAGE", "EMPTY", "DOWN"] {
        match client.get_ticker(pair).await {
            Err(ExchangeError::MarketData { pair: p, .. }) => assert_eq!(p, pair),
            other => panic!("{pair}: expected MarketData, got {other:?}"),
        }
    }

    // Only the 5xx is retried: one attempt plus two retries
    let hits = mock.ticker_hits.lock().clone();
    assert_eq!(hits.iter().filter(|p| *p == "DOWN").count(), 3);
    assert_eq!(hits.iter().filter(|p| *p == "ERR").count(), 1);
}

#[tokio::test]
async fn test_add_order_body_and_signature() {
    let (mock, url) = start_mock().await;
    mock.private(
        "AddOrder",
        Reply::ok(json!({
            "error": [],
            "result": {
                "descr": {"order": "buy 0.00019999 XXBTZEUR @ limit 49999.62"},
                "txid": ["OUF4EM-FRGI2-MQMWZD"]
            }
        })),
    );

    let result = client(&url, false).add_order(&dca_order()).await.unwrap();
    assert_eq!(result.txid, vec!["OUF4EM-FRGI2-MQMWZD".to_string()]);

    let captured = mock.captured();
    assert_eq!(captured.len(), 1);
    let req = &captured[0];
    assert_eq!(req.method, "AddOrder");
    assert_eq!(req.api_key.as_deref(), Some(API_KEY));
    assert!(req.signature_valid, "API-Sign must cover the transmitted body");

    let nonce = field(&req.body, "nonce").unwrap();
    assert_eq!(
        req.body,
        format!(
            "nonce={nonce}&ordertype=limit&oflags=post&type=buy&volume=0.00019999&pair=XXBTZEUR&price=49999.62"
        )
    );
}

#[tokio::test]
async fn test_validate_only_appends_flag() {
    let (mock, url) = start_mock().await;
    mock.private(
        "AddOrder",
        Reply::ok(json!({"error": [], "result": {"descr": {"order": "buy 0.00019999 XXBTZEUR @ limit 49999.62"}}})),
    );

    let result = client(&url, true).add_order(&dca_order()).await.unwrap();
    assert!(result.is_validation_only());

    let captured = mock.captured();
    assert!(captured[0].body.ends_with("&price=49999.62&validate=true"));
    assert!(captured[0].signature_valid);
}

#[tokio::test]
async fn test_add_order_never_retried() {
    let (mock, url) = start_mock().await;
    mock.private("AddOrder", Reply::raw(StatusCode::SERVICE_UNAVAILABLE, "unavailable"));

    let result = client(&url, false).add_order(&dca_order()).await;
    assert!(matches!(result, Err(ExchangeError::Network(_))));
    assert_eq!(mock.captured().len(), 1);
}

#[tokio::test]
async fn test_add_order_timeout_is_network_error_and_not_resent() {
    let (mock, url) = start_mock().await;
    mock.private(
        "AddOrder",
        Reply::ok(json!({"error": [], "result": {"descr": {"order": "late"}, "txid": ["LATE"]}}))
            .after(Duration::from_secs(3)),
    );

    let result = impatient_client(&url).add_order(&dca_order()).await;
    assert!(matches!(result, Err(ExchangeError::Network(_))), "got {result:?}");
    assert_eq!(mock.captured().len(), 1);
}

#[tokio::test]
async fn test_read_timeouts_are_retried() {
    let (mock, url) = start_mock().await;
    let slow = Duration::from_secs(3);
    mock.private("Balance", Reply::ok(json!({"error": [], "result": {}})).after(slow));
    mock.ticker(
        "XXBTZEUR",
        Reply::ok(json!({"error": [], "result": {"XXBTZEUR": {"b": ["1", "1", "1"]}}})).after(slow),
    );

    let client = impatient_client(&url);

    let balance = client.get_balance().await;
    assert!(matches!(balance, Err(ExchangeError::Network(_))), "got {balance:?}");
    // One attempt plus three retries
    assert_eq!(mock.captured().len(), 4);

    let ticker = client.get_ticker("XXBTZEUR").await;
    assert!(matches!(ticker, Err(ExchangeError::MarketData { .. })), "got {ticker:?}");
    assert_eq!(mock.ticker_hits.lock().len(), 4);
}

#[tokio::test]
async fn test_add_order_business_rejection() {
    let (mock, url) = start_mock().await;
    mock.private("AddOrder", Reply::ok(json!({"error": ["EOrder:Insufficient funds"]})));

    let result = client(&url, false).add_order(&dca_order()).await;
    assert_eq!(
        result.unwrap_err(),
        ExchangeError::Exchange("EOrder:Insufficient funds".to_string())
    );
}

#[tokio::test]
async fn test_get_balance_parses_and_auth_is_fatal() {
    let (mock, url) = start_mock().await;
    mock.private(
        "Balance",
        Reply::ok(json!({"error": [], "result": {"ZEUR": "1250.4200", "XXBT": "0.0105000000"}})),
    );

    let client = client(&url, false);
    let balances = client.get_balance().await.unwrap();
    assert_eq!(balances["ZEUR"], dec!(1250.42));
    assert_eq!(balances["XXBT"], dec!(0.0105));

    let captured = mock.captured();
    assert!(captured[0].body.starts_with("nonce="));
    assert!(!captured[0].body.contains('&'));

    mock.private("Balance", Reply::ok(json!({"error": ["EAPI:Invalid key"]})));
    let err = client.get_balance().await.unwrap_err();
    assert!(err.is_auth());
    // Auth failures are not retried
    assert_eq!(mock.captured().len(), 2);
}

#[tokio::test]
async fn test_get_closed_orders_requests_trades() {
    let (mock, url) = start_mock().await;
    mock.private(
        "ClosedOrders",
        Reply::ok(json!({"error": [], "result": {"closed": {}, "count": 0}})),
    );

    let orders = client(&url, false).get_closed_orders().await.unwrap();
    assert!(orders.closed.is_empty());

    let captured = mock.captured();
    assert_eq!(field(&captured[0].body, "trades"), Some("true"));
    assert!(captured[0].signature_valid);
}

#[tokio::test]
async fn test_nonces_strictly_increase_across_requests() {
    let (mock, url) = start_mock().await;
    mock.private("Balance", Reply::ok(json!({"error": [], "result": {}})));

    let client = client(&url, false);
    for _ in 0..5 {
        client.get_balance().await.unwrap();
    }

    let nonces: Vec<u64> = mock
        .captured()
        .iter()
        .filter_map(|r| field(&r.body, "nonce").and_then(|n| n.parse().ok()))
        .collect();
    assert_eq!(nonces.len(), 5);
    assert!(nonces.windows(2).all(|w| w[1] > w[0]));
}
