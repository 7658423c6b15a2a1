//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info,kdca=debug";

/// Output format of the log layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// `RUST_ENV=production` selects JSON; anything else is pretty.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }

    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var("RUST_ENV").ok().as_deref())
    }
}

/// Initialize structured logging.
///
/// # Errors
/// Returns `TelemetryError::LoggingInit` if a global subscriber is already set.
pub fn init_logging() -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

/// Span for one job run. Every event logged inside carries the `run_id`.
pub fn run_span(job: &str) -> (Uuid, Span) {
    let run_id = Uuid::new_v4();
    let span = tracing::info_span!("dca_run", job, run_id = %run_id);
    (run_id, span)
}
