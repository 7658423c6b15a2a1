//! Exchange abstraction used by the DCA job.
//!
//! [`KrakenClient`] is the production implementation; [`MockExchange`]
//! serves canned data and records orders for tests.

use crate::client::KrakenClient;
use crate::error::{ExchangeError, ExchangeResult};
use crate::types::{Balances, ClosedOrders, OrderDescription, OrderResult};
use kdca_core::{OrderRequest, Price, TickerSnapshot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Operations the DCA job needs from an exchange.
pub trait ExchangeApi: Send + Sync {
    fn get_ticker<'a>(&'a self, pair: &'a str) -> BoxFuture<'a, ExchangeResult<TickerSnapshot>>;

    fn get_balance(&self) -> BoxFuture<'_, ExchangeResult<Balances>>;

    /// Submit an order exactly once.
    fn add_order<'a>(&'a self, order: &'a OrderRequest) -> BoxFuture<'a, ExchangeResult<OrderResult>>;

    fn get_closed_orders(&self) -> BoxFuture<'_, ExchangeResult<ClosedOrders>>;
}

impl ExchangeApi for KrakenClient {
    fn get_ticker<'a>(&'a self, pair: &'a str) -> BoxFuture<'a, ExchangeResult<TickerSnapshot>> {
        Box::pin(KrakenClient::get_ticker(self, pair))
    }

    fn get_balance(&self) -> BoxFuture<'_, ExchangeResult<Balances>> {
        Box::pin(KrakenClient::get_balance(self))
    }

    fn add_order<'a>(&'a self, order: &'a OrderRequest) -> BoxFuture<'a, ExchangeResult<OrderResult>> {
        Box::pin(KrakenClient::add_order(self, order))
    }

    fn get_closed_orders(&self) -> BoxFuture<'_, ExchangeResult<ClosedOrders>> {
        Box::pin(KrakenClient::get_closed_orders(self))
    }
}

/// In-memory exchange for testing.
#[derive(Debug, Default)]
pub struct MockExchange {
    bids: Mutex<HashMap<String, Price>>,
    ticker_failures: Mutex<HashMap<String, ExchangeError>>,
    order_failures: Mutex<HashMap<String, ExchangeError>>,
    balance: Mutex<Balances>,
    balance_failure: Mutex<Option<ExchangeError>>,
    /// Recorded ticker lookups, in call order.
    ticker_calls: Mutex<Vec<String>>,
    /// Recorded order submissions, in call order.
    orders: Mutex<Vec<OrderRequest>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bid` as the best bid for `pair`.
    pub fn set_bid(&self, pair: impl Into<String>, bid: Price) {
        self.bids.lock().insert(pair.into(), bid);
    }

    pub fn fail_ticker(&self, pair: impl Into<String>) {
        let pair = pair.into();
        let err = ExchangeError::MarketData {
            pair: pair.clone(),
            reason: "ticker unavailable".to_string(),
        };
        self.ticker_failures.lock().insert(pair, err);
    }

    pub fn fail_order(&self, pair: impl Into<String>, err: ExchangeError) {
        self.order_failures.lock().insert(pair.into(), err);
    }

    pub fn set_balance(&self, balance: Balances) {
        *self.balance.lock() = balance;
    }

    pub fn fail_balance(&self, err: ExchangeError) {
        *self.balance_failure.lock() = Some(err);
    }

    pub fn ticker_calls(&self) -> Vec<String> {
        self.ticker_calls.lock().clone()
    }

    /// Every order passed to `add_order`, including rejected ones.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().clone()
    }
}

impl ExchangeApi for MockExchange {
    fn get_ticker<'a>(&'a self, pair: &'a str) -> BoxFuture<'a, ExchangeResult<TickerSnapshot>> {
        Box::pin(async move {
            self.ticker_calls.lock().push(pair.to_string());
            if let Some(err) = self.ticker_failures.lock().get(pair) {
                return Err(err.clone());
            }
            let best_bid = self.bids.lock().get(pair).copied().ok_or_else(|| {
                ExchangeError::MarketData {
                    pair: pair.to_string(),
                    reason: "unknown pair".to_string(),
                }
            })?;
            Ok(TickerSnapshot {
                pair: pair.to_string(),
                best_bid,
            })
        })
    }

    fn get_balance(&self) -> BoxFuture<'_, ExchangeResult<Balances>> {
        Box::pin(async move {
            if let Some(err) = self.balance_failure.lock().clone() {
                return Err(err);
            }
            Ok(self.balance.lock().clone())
        })
    }

    fn add_order<'a>(&'a self, order: &'a OrderRequest) -> BoxFuture<'a, ExchangeResult<OrderResult>> {
        Box::pin(async move {
            let seq = {
                let mut orders = self.orders.lock();
                orders.push(order.clone());
                orders.len()
            };
            if let Some(err) = self.order_failures.lock().get(&order.pair) {
                return Err(err.clone());
            }
            Ok(OrderResult {
                descr: OrderDescription {
                    order: format!(
                        "{} {} {} @ {} {}",
                        order.side, order.volume, order.pair, order.order_type, order.price
                    ),
                    close: None,
                },
                txid: vec![format!("MOCK-{seq:05}")],
            })
        })
    }

    fn get_closed_orders(&self) -> BoxFuture<'_, ExchangeResult<ClosedOrders>> {
        Box::pin(async move { Ok(ClosedOrders::default()) })
    }
}
