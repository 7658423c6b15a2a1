//! HTTP client for the Kraken REST API.
//!
//! Public endpoints are plain GETs. Private endpoints are form-encoded POSTs
//! carrying a fresh nonce and an `API-Sign` header computed over the exact
//! body bytes that are sent.

use crate::error::{ExchangeError, ExchangeResult};
use crate::nonce::NonceManager;
use crate::retry::RetryConfig;
use crate::signer::{encode_body, Credentials, KrakenSigner};
use crate::types::{ApiResponse, Balances, ClosedOrders, OrderResult, TickerResponse};
use kdca_core::{OrderFlag, OrderRequest, OrderType, Price, TickerSnapshot};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_API_URL: &str = "https://api.kraken.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Client settings that are not credentials.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheme and host, without trailing slash.
    pub base_url: String,
    pub timeout: Duration,
    /// Applied to ticker, balance and closed-orders requests only.
    pub retry: RetryConfig,
    /// Send `validate=true` with every order so nothing is placed.
    pub validate_only: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            validate_only: false,
        }
    }
}

/// Authenticated Kraken REST client.
pub struct KrakenClient {
    http: Client,
    base_url: String,
    api_key: String,
    signer: KrakenSigner,
    nonces: Arc<NonceManager>,
    retry: RetryConfig,
    validate_only: bool,
}

impl KrakenClient {
    /// Build a client.
    ///
    /// # Errors
    /// Returns `ExchangeError::Config` for empty credentials, a secret that
    /// is not base64, or an HTTP client that cannot be built.
    pub fn new(credentials: &Credentials, config: ClientConfig) -> ExchangeResult<Self> {
        if credentials.api_key.trim().is_empty() {
            return Err(ExchangeError::Config("api key is empty".to_string()));
        }
        let signer = KrakenSigner::new(&credentials.secret_key)?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key.trim().to_string(),
            signer,
            nonces: Arc::new(NonceManager::with_system_clock()),
            retry: config.retry,
            validate_only: config.validate_only,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_validate_only(&self) -> bool {
        self.validate_only
    }

    /// Best bid for `pair`.
    ///
    /// Every failure, including transport errors, surfaces as
    /// `ExchangeError::MarketData`.
    pub async fn get_ticker(&self, pair: &str) -> ExchangeResult<TickerSnapshot> {
        self.retry
            .run("Ticker", || self.fetch_ticker(pair))
            .await
            .map_err(|e| match e {
                ExchangeError::MarketData { .. } => e,
                other => ExchangeError::MarketData {
                    pair: pair.to_string(),
                    reason: other.to_string(),
                },
            })
    }

    async fn fetch_ticker(&self, pair: &str) -> ExchangeResult<TickerSnapshot> {
        let url = format!("{}/0/public/Ticker", self.base_url);
        debug!(pair, "Fetching ticker");

        let response = self.http.get(&url).query(&[("pair", pair)]).send().await?;
        let mut tickers: TickerResponse = read_envelope(response).await?;

        // Result is keyed by the canonical name, which may differ from the requested alias
        let info = match tickers.remove(pair) {
            Some(info) => info,
            None if tickers.len() == 1 => tickers
                .into_values()
                .next()
                .ok_or_else(|| market_data(pair, "empty ticker result"))?,
            None => return Err(market_data(pair, "pair missing from ticker result")),
        };

        let raw_bid = info
            .bid
            .first()
            .ok_or_else(|| market_data(pair, "ticker has no bid"))?;
        let best_bid: Price = raw_bid
            .parse()
            .map_err(|e| market_data(pair, &format!("invalid bid {raw_bid:?}: {e}")))?;
        if !best_bid.is_positive() {
            return Err(market_data(pair, &format!("non-positive bid {best_bid}")));
        }

        Ok(TickerSnapshot {
            pair: pair.to_string(),
            best_bid,
        })
    }

    /// Account balances.
    pub async fn get_balance(&self) -> ExchangeResult<Balances> {
        self.retry
            .run("Balance", || self.private_post("Balance", Vec::new()))
            .await
    }

    /// Submit one order. Never retried.
    pub async fn add_order(&self, order: &OrderRequest) -> ExchangeResult<OrderResult> {
        let mut params = vec![("ordertype", order.order_type.as_str().to_string())];
        if !order.flags.is_empty() {
            params.push(("oflags", OrderFlag::join(&order.flags)));
        }
        params.push(("type", order.side.as_str().to_string()));
        params.push(("volume", order.volume.to_string()));
        params.push(("pair", order.pair.clone()));
        if order.order_type == OrderType::Limit {
            params.push(("price", order.price.to_string()));
        }
        if self.validate_only {
            params.push(("validate", "true".to_string()));
        }

        info!(
            pair = %order.pair,
            side = %order.side,
            order_type = %order.order_type,
            volume = %order.volume,
            price = %order.price,
            validate_only = self.validate_only,
            "Submitting order"
        );

        self.private_post("AddOrder", params).await
    }

    /// Closed orders including their trade ids.
    pub async fn get_closed_orders(&self) -> ExchangeResult<ClosedOrders> {
        self.retry
            .run("ClosedOrders", || {
                self.private_post("ClosedOrders", vec![("trades", "true".to_string())])
            })
            .await
    }

    /// Sign and send a private request.
    ///
    /// A new nonce is drawn on every call, so a retried read is a new request.
    async fn private_post<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<(&str, String)>,
    ) -> ExchangeResult<T> {
        let nonce = self.nonces.next();
        let mut body_params = Vec::with_capacity(params.len() + 1);
        body_params.push(("nonce", nonce.to_string()));
        body_params.extend(params);

        let body = encode_body(&body_params)?;
        let path = format!("/0/private/{method}");
        let signature = self.signer.sign(&path, nonce, &body)?;

        debug!(method, nonce, "Sending private request");

        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("API-Key", &self.api_key)
            .header("API-Sign", signature)
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        read_envelope(response).await.map_err(|e| {
            if e.is_auth() {
                error!(method, error = %e, "Exchange rejected credentials");
            }
            e
        })
    }
}

fn market_data(pair: &str, reason: &str) -> ExchangeError {
    ExchangeError::MarketData {
        pair: pair.to_string(),
        reason: reason.to_string(),
    }
}

/// Map status, then parse the `{error, result}` envelope.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> ExchangeResult<T> {
    let status = response.status();
    let text = response.text().await?;

    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        return Err(ExchangeError::Network(format!("HTTP {status}: {text}")));
    }
    if !status.is_success() {
        return Err(ExchangeError::Exchange(format!("HTTP {status}: {text}")));
    }

    let envelope: ApiResponse<T> =
        serde_json::from_str(&text).map_err(|e| ExchangeError::Decode(e.to_string()))?;
    envelope.into_result()
}
