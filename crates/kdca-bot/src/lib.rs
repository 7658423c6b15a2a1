//! Kraken dollar-cost-averaging bot.
//!
//! Wires the pieces together:
//! - `AppConfig`: TOML configuration with environment overrides
//! - `DcaJob`: one scheduled purchase run over all targets
//! - `Application`: scheduler ownership and shutdown handling

pub mod app;
pub mod config;
pub mod error;
pub mod job;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use job::{DcaJob, PairOutcome, RunReport, DCA_JOB_ID};
