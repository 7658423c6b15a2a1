//! Main application orchestration.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::job::{DcaJob, DCA_JOB_ID};
use chrono::NaiveDateTime;
use kdca_exchange::{ExchangeApi, KrakenClient};
use kdca_schedule::Scheduler;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Owns the scheduler and the registered DCA job.
pub struct Application {
    scheduler: Scheduler,
    job: Arc<DcaJob>,
}

impl Application {
    /// Validate the configuration and build the Kraken client.
    ///
    /// # Errors
    /// Any configuration, credential or schedule problem, before anything runs.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let client = KrakenClient::new(&config.credentials, config.client_config())?;
        info!(
            api_url = %client.base_url(),
            validate_only = client.is_validate_only(),
            "Exchange client ready"
        );
        Self::with_exchange(&config, Arc::new(client))
    }

    /// Build against any exchange implementation.
    pub fn with_exchange(config: &AppConfig, exchange: Arc<dyn ExchangeApi>) -> AppResult<Self> {
        let job = Arc::new(DcaJob::from_config(config, exchange));
        let mut scheduler = Scheduler::new(config.timezone);
        scheduler.add_job(DCA_JOB_ID, &config.schedule, job.clone())?;

        for target in job.targets() {
            info!(
                pair = %target.pair,
                symbol = %target.symbol,
                amount_worth = %target.amount_worth,
                currency = %config.base_currency,
                "DCA target"
            );
        }

        Ok(Self { scheduler, job })
    }

    pub fn next_fire_time(&self) -> Option<NaiveDateTime> {
        self.scheduler.next_fire_time(DCA_JOB_ID)
    }

    pub fn job(&self) -> Arc<DcaJob> {
        self.job.clone()
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => {
                    warn!(error = %e, "Cannot listen for Ctrl-C, running until killed");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
    }

    /// Run until `shutdown` resolves or the schedule is exhausted.
    ///
    /// A run in progress when shutdown arrives is finished first.
    pub async fn run_until<F>(self, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        info!(next_fire = ?self.next_fire_time(), "Starting application");
        let executed = self.scheduler.run(shutdown).await;
        info!(executed, "Shutting down");
        Ok(())
    }
}
