//! Nonce manager for private requests.
//!
//! Kraken rejects any nonce that is not strictly greater than the previous
//! one for the same key, so nonces come from a shared atomic counter rather
//! than raw wall-clock samples.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current time, replaceable in tests.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since Unix epoch.
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Issues strictly increasing millisecond nonces.
///
/// # Guarantees
/// - Every call returns a value greater than all previous calls
/// - Values track wall-clock milliseconds when the clock moves forward
/// - Thread-safe for concurrent access
pub struct NonceManager<C: Clock = SystemClock> {
    /// Last issued nonce.
    counter: AtomicU64,
    clock: C,
}

impl<C: Clock> NonceManager<C> {
    #[must_use]
    pub fn new(clock: C) -> Self {
        Self {
            counter: AtomicU64::new(0),
            clock,
        }
    }

    /// Next nonce: `max(last + 1, now_ms)`.
    ///
    /// Thread-safe via CAS loop.
    pub fn next(&self) -> u64 {
        let now = self.clock.now_ms();

        loop {
            let current = self.counter.load(Ordering::Acquire);
            let next_val = current.saturating_add(1).max(now);

            match self.counter.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_val,
                Err(_) => continue,
            }
        }
    }

    /// Last issued nonce, or 0 before the first call.
    #[must_use]
    pub fn last(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }
}

impl NonceManager<SystemClock> {
    #[must_use]
    pub fn with_system_clock() -> Self {
        Self::new(SystemClock)
    }
}

impl Default for NonceManager<SystemClock> {
    fn default() -> Self {
        Self::with_system_clock()
    }
}
