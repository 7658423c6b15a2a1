//! Core domain types for the Kraken DCA bot.
//!
//! This crate provides the types shared by the exchange client and the job:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `OrderRequest`, `OrderSide`, `OrderType`, `OrderFlag`: Order description
//! - `DcaTarget`, `TickerSnapshot`: Purchase targets and market data
//! - `pricing`: Limit price and volume derivation

pub mod decimal;
pub mod error;
pub mod order;
pub mod pricing;
pub mod target;

pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use order::{OrderFlag, OrderRequest, OrderSide, OrderType};
pub use pricing::{compute_volume, derive_limit_price, DEFAULT_PRICE_MARGIN};
pub use target::{DcaTarget, TickerSnapshot};
