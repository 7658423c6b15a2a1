//! Kraken REST client for the DCA bot.
//!
//! Provides:
//! - `KrakenClient`: ticker, balance, order and closed-orders endpoints
//! - `KrakenSigner`: `API-Sign` computation over the transmitted body
//! - `NonceManager`: strictly increasing nonces under concurrency
//! - `RetryConfig`: backoff for read-only requests
//! - `ExchangeApi` / `MockExchange`: seam for the job and its tests

pub mod api;
pub mod client;
pub mod error;
pub mod nonce;
pub mod retry;
pub mod signer;
pub mod types;

pub use api::{BoxFuture, ExchangeApi, MockExchange};
pub use client::{ClientConfig, KrakenClient, DEFAULT_API_URL, DEFAULT_TIMEOUT};
pub use error::{ExchangeError, ExchangeResult};
pub use nonce::{Clock, NonceManager, SystemClock};
pub use retry::{Backoff, RetryConfig};
pub use signer::{encode_body, Credentials, KrakenSigner};
pub use types::{
    ApiResponse, Balances, ClosedOrder, ClosedOrderDescription, ClosedOrders, OrderDescription,
    OrderResult, TickerInfo, TickerResponse,
};
