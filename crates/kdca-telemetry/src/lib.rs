//! Structured logging for the Kraken DCA bot.
//!
//! - `init_logging`: JSON output in production, pretty output otherwise
//! - `run_span`: per-run span carrying a fresh `run_id`

pub mod error;
pub mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, run_span, LogFormat, DEFAULT_FILTER};
