//! Wire types for Kraken REST responses.

use crate::error::{ExchangeError, ExchangeResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Account balances keyed by asset code (`ZEUR`, `XXBT`, ...).
pub type Balances = BTreeMap<String, Decimal>;

/// Envelope shared by every endpoint: `{"error": [...], "result": {...}}`.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub error: Vec<String>,
    pub result: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Unwrap the result, classifying a non-empty error array.
    ///
    /// Entries starting with `W` are warnings and do not fail the call.
    pub fn into_result(self) -> ExchangeResult<T> {
        let (warnings, errors): (Vec<String>, Vec<String>) =
            self.error.into_iter().partition(|e| e.starts_with('W'));
        if !warnings.is_empty() {
            warn!(?warnings, "Exchange returned warnings");
        }
        if !errors.is_empty() {
            return Err(ExchangeError::from_api_errors(&errors));
        }
        self.result
            .ok_or_else(|| ExchangeError::Decode("response has neither error nor result".to_string()))
    }
}

/// One entry of the public ticker result.
///
/// Price arrays are `[price, whole lot volume, lot volume]`.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerInfo {
    /// Best ask.
    #[serde(rename = "a", default)]
    pub ask: Vec<String>,
    /// Best bid.
    #[serde(rename = "b", default)]
    pub bid: Vec<String>,
    /// Last trade closed.
    #[serde(rename = "c", default)]
    pub last: Vec<String>,
}

/// Ticker result keyed by the exchange's canonical pair name.
pub type TickerResponse = HashMap<String, TickerInfo>;

/// Result of `AddOrder`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderResult {
    pub descr: OrderDescription,
    /// Transaction ids. Empty when the order was only validated.
    #[serde(default)]
    pub txid: Vec<String>,
}

impl OrderResult {
    pub fn is_validation_only(&self) -> bool {
        self.txid.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDescription {
    /// Human-readable order summary (`buy 1.25 XBTUSD @ limit 37500.0`).
    pub order: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<String>,
}

/// Result of `ClosedOrders`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosedOrders {
    #[serde(default)]
    pub closed: HashMap<String, ClosedOrder>,
    /// Total number of matching orders (may exceed `closed.len()`).
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedOrder {
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub opentm: f64,
    #[serde(default)]
    pub closetm: f64,
    pub descr: ClosedOrderDescription,
    pub vol: Decimal,
    pub vol_exec: Decimal,
    pub cost: Decimal,
    pub fee: Decimal,
    /// Average fill price.
    pub price: Decimal,
    #[serde(default)]
    pub oflags: String,
    /// Trade ids, present when requested with `trades=true`.
    #[serde(default)]
    pub trades: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedOrderDescription {
    pub pair: String,
    #[serde(rename = "type")]
    pub side: String,
    pub ordertype: String,
    pub price: String,
    pub order: String,
}
