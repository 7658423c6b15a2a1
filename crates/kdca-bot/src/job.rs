//! The scheduled DCA purchase run.
//!
//! One run: read the account balance, then for every target fetch the best
//! bid, derive a limit price and volume, and submit a post-only limit buy.
//! Targets are independent; a failure for one never stops the next.

use crate::config::AppConfig;
use kdca_core::{compute_volume, derive_limit_price, DcaTarget, OrderRequest, Price, Size};
use kdca_exchange::{Balances, ExchangeApi, ExchangeError, OrderResult};
use kdca_schedule::{BoxFuture, Job};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Scheduler id of the purchase job.
pub const DCA_JOB_ID: &str = "DCA_JOB";

/// What happened to one target during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PairOutcome {
    /// Order accepted (or validated, in validate-only mode).
    Ordered {
        pair: String,
        price: Price,
        volume: Size,
        result: OrderResult,
    },
    /// Ticker could not be fetched; nothing was submitted.
    MarketDataUnavailable { pair: String, error: ExchangeError },
    /// Derived price or volume was unusable; nothing was submitted.
    Skipped { pair: String, reason: String },
    /// Order submission failed.
    OrderFailed {
        pair: String,
        price: Price,
        volume: Size,
        error: ExchangeError,
    },
}

impl PairOutcome {
    pub fn pair(&self) -> &str {
        match self {
            Self::Ordered { pair, .. }
            | Self::MarketDataUnavailable { pair, .. }
            | Self::Skipped { pair, .. }
            | Self::OrderFailed { pair, .. } => pair,
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Ordered { .. })
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Balances read at the start of the run.
    pub balances: Option<Balances>,
    /// Set when the balance call failed and the run stopped early.
    pub aborted: Option<ExchangeError>,
    /// One entry per target, in configuration order.
    pub outcomes: Vec<PairOutcome>,
}

impl RunReport {
    pub fn ordered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ordered()).count()
    }
}

/// Purchases every configured target once per invocation.
pub struct DcaJob {
    exchange: Arc<dyn ExchangeApi>,
    targets: Vec<DcaTarget>,
    base_currency: String,
    base_currency_symbol: String,
    price_margin: Decimal,
    last_report: Mutex<Option<RunReport>>,
}

impl DcaJob {
    pub fn new(
        exchange: Arc<dyn ExchangeApi>,
        targets: Vec<DcaTarget>,
        base_currency: impl Into<String>,
        price_margin: Decimal,
    ) -> Self {
        let base_currency = base_currency.into();
        Self {
            exchange,
            targets,
            base_currency_symbol: base_currency.clone(),
            base_currency,
            price_margin,
            last_report: Mutex::new(None),
        }
    }

    pub fn from_config(config: &AppConfig, exchange: Arc<dyn ExchangeApi>) -> Self {
        let mut job = Self::new(
            exchange,
            config.dca_targets.clone(),
            config.base_currency.clone(),
            config.price_margin,
        );
        if !config.base_currency_symbol.is_empty() {
            job.base_currency_symbol = config.base_currency_symbol.clone();
        }
        job
    }

    pub fn targets(&self) -> &[DcaTarget] {
        &self.targets
    }

    /// Report of the most recent completed run.
    pub fn last_report(&self) -> Option<RunReport> {
        self.last_report.lock().clone()
    }

    /// Run once, inside a span carrying a fresh `run_id`.
    ///
    /// Never fails: every error is logged and recorded in the report.
    pub async fn execute(&self) -> RunReport {
        let (run_id, span) = kdca_telemetry::run_span(DCA_JOB_ID);
        let report = self.execute_run(run_id).instrument(span).await;
        *self.last_report.lock() = Some(report.clone());
        report
    }

    async fn execute_run(&self, run_id: Uuid) -> RunReport {
        info!(targets = self.targets.len(), "DCA run started");

        let balances = match self.exchange.get_balance().await {
            Ok(balances) => balances,
            Err(e) => {
                if e.is_auth() {
                    error!(error = %e, "Credentials rejected, aborting run");
                } else {
                    error!(error = %e, "Balance fetch failed, aborting run");
                }
                return RunReport {
                    run_id,
                    balances: None,
                    aborted: Some(e),
                    outcomes: Vec::new(),
                };
            }
        };

        let available = balances
            .get(&self.base_currency)
            .copied()
            .unwrap_or(Decimal::ZERO);
        info!(
            currency = %self.base_currency,
            balance = %available,
            symbol = %self.base_currency_symbol,
            "Account balance"
        );

        let budget: Decimal = self.targets.iter().map(|t| t.amount_worth).sum();
        if available < budget {
            warn!(%available, %budget, "Balance below total budget of this run");
        }

        let mut outcomes = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            outcomes.push(self.buy(target).await);
        }

        let report = RunReport {
            run_id,
            balances: Some(balances),
            aborted: None,
            outcomes,
        };
        info!(
            ordered = report.ordered_count(),
            targets = self.targets.len(),
            "DCA run finished"
        );
        report
    }

    async fn buy(&self, target: &DcaTarget) -> PairOutcome {
        let pair = target.pair.clone();

        let ticker = match self.exchange.get_ticker(&target.pair).await {
            Ok(ticker) => ticker,
            Err(error) => {
                warn!(pair = %pair, error = %error, "Ticker unavailable, skipping pair");
                return PairOutcome::MarketDataUnavailable { pair, error };
            }
        };

        let price = derive_limit_price(ticker.best_bid, self.price_margin);
        if !price.is_positive() {
            warn!(pair = %pair, best_bid = %ticker.best_bid, %price, "Non-positive limit price, skipping pair");
            return PairOutcome::Skipped {
                pair,
                reason: format!("non-positive limit price {price}"),
            };
        }

        let volume = match compute_volume(target.amount_worth, price) {
            Some(volume) if !volume.is_zero() => volume,
            _ => {
                warn!(pair = %pair, amount_worth = %target.amount_worth, %price, "Budget too small for minimum volume, skipping pair");
                return PairOutcome::Skipped {
                    pair,
                    reason: format!("volume rounds to zero at {price}"),
                };
            }
        };

        info!(
            pair = %pair,
            best_bid = %ticker.best_bid,
            "Buying {} {} at {} {}",
            volume,
            target.symbol,
            price,
            self.base_currency_symbol
        );

        let order = OrderRequest::post_only_limit_buy(pair.clone(), volume, price);
        match self.exchange.add_order(&order).await {
            Ok(result) => {
                info!(
                    pair = %pair,
                    txid = ?result.txid,
                    description = %result.descr.order,
                    "Order accepted"
                );
                PairOutcome::Ordered {
                    pair,
                    price,
                    volume,
                    result,
                }
            }
            Err(error) => {
                error!(pair = %pair, error = %error, "Order submission failed");
                PairOutcome::OrderFailed {
                    pair,
                    price,
                    volume,
                    error,
                }
            }
        }
    }
}

impl Job for DcaJob {
    fn run(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.execute().await;
        })
    }
}
