//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Schedule error: {0}")]
    Schedule(#[from] kdca_schedule::ScheduleError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] kdca_exchange::ExchangeError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] kdca_telemetry::TelemetryError),
}

pub type AppResult<T> = Result<T, AppError>;
