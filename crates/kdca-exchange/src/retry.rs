//! Retry policy for read-only requests.
//!
//! Order submission never goes through here: a retried `AddOrder` whose
//! first attempt reached the exchange would buy twice.

use crate::error::ExchangeResult;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt`, capped at `max`, optionally spread by
    /// +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds);
                if !jitter {
                    return delay;
                }

                let jitter_ms = delay.as_millis() as u64 / 2;
                let offset = fastrand::u64(0..=jitter_ms * 2);
                Duration::from_millis((delay.as_millis() as u64 + offset).saturating_sub(jitter_ms))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// Run `call` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut call: F) -> ExchangeResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ExchangeResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Read request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
