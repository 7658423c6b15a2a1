//! Exchange client error types.

use thiserror::Error;

/// Error markers that mean the credentials are unusable.
const AUTH_ERRORS: &[&str] = &[
    "EAPI:Invalid key",
    "EAPI:Invalid signature",
    "EGeneral:Permission denied",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Connect failure, timeout or 5xx. Retryable for reads only.
    #[error("Network error: {0}")]
    Network(String),

    /// Rejected credentials. Never retried.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Well-formed rejection from the exchange.
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// Ticker could not be fetched or understood.
    #[error("Market data unavailable for {pair}: {reason}")]
    MarketData { pair: String, reason: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Request encoding failed: {0}")]
    Encode(String),

    #[error("Invalid client configuration: {0}")]
    Config(String),
}

impl ExchangeError {
    /// Classify the `error` array of an exchange response.
    pub fn from_api_errors(errors: &[String]) -> Self {
        let joined = errors.join("; ");
        if errors
            .iter()
            .any(|e| AUTH_ERRORS.iter().any(|marker| e.starts_with(marker)))
        {
            Self::Auth(joined)
        } else {
            Self::Exchange(joined)
        }
    }

    /// Whether a read request may be attempted again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
