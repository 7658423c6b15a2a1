//! Order-related types.
//!
//! Provides order side, type, flags and the request that the exchange
//! client turns into an `AddOrder` body.

use crate::decimal::{Price, Size};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Wire value for the `type` body field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Limit order.
    Limit,
    /// Market order. Carries no price on the wire.
    Market,
}

impl OrderType {
    /// Wire value for the `ordertype` body field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Limit => "limit",
            Self::Market => "market",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order flags sent in the comma-separated `oflags` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderFlag {
    /// Post-only: the order is cancelled instead of taking liquidity.
    Post,
    /// Prefer fee in base currency.
    Fcib,
    /// Prefer fee in quote currency.
    Fciq,
    /// Disable market price protection.
    Nompp,
    /// Volume expressed in quote currency.
    Viqc,
}

impl OrderFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Fcib => "fcib",
            Self::Fciq => "fciq",
            Self::Nompp => "nompp",
            Self::Viqc => "viqc",
        }
    }

    /// Join flags into the wire representation (`"post,fciq"`).
    pub fn join(flags: &[OrderFlag]) -> String {
        flags
            .iter()
            .map(OrderFlag::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A single order to submit.
///
/// The nonce is not part of the request; the exchange client attaches a
/// fresh one at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub pair: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    #[serde(default)]
    pub flags: Vec<OrderFlag>,
    pub volume: Size,
    pub price: Price,
}

impl OrderRequest {
    /// Post-only limit buy, the only order shape the DCA job places.
    pub fn post_only_limit_buy(pair: impl Into<String>, volume: Size, price: Price) -> Self {
        Self {
            pair: pair.into(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            flags: vec![OrderFlag::Post],
            volume,
            price,
        }
    }
}
