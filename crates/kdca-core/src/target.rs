//! Purchase targets and market data snapshots.

use crate::decimal::Price;
use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One fiat-denominated purchase made on every scheduled run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcaTarget {
    /// Exchange pair name (e.g., "XXBTZEUR").
    pub pair: String,
    /// Budget in quote currency spent per run.
    pub amount_worth: Decimal,
    /// Display symbol of the purchased asset (e.g., "BTC").
    pub symbol: String,
}

impl DcaTarget {
    /// A target needs a pair name and a positive budget.
    ///
    /// # Errors
    /// Returns `CoreError::InvalidTarget` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| CoreError::InvalidTarget {
            pair: self.pair.clone(),
            reason,
        };
        if self.pair.trim().is_empty() {
            return Err(invalid("pair is empty".to_string()));
        }
        if self.amount_worth <= Decimal::ZERO {
            return Err(invalid(format!(
                "amount_worth must be positive, got {}",
                self.amount_worth
            )));
        }
        Ok(())
    }
}

/// Best bid for a pair, fetched fresh on every run and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerSnapshot {
    pub pair: String,
    pub best_bid: Price,
}
