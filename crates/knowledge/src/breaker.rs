//! Consecutive-failure circuit breaker.
//!
//! Counts consecutive failures and trips once the threshold is reached.
//! A tripped breaker stays open for the life of the owning client; there is
//! no half-open trial call. Recreate the client to reset it.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::warn;

#[derive(Debug)]
pub struct CircuitBreaker {
    max_failures: u32,
    failures: AtomicU32,
    tripped: AtomicBool,
}

impl CircuitBreaker {
    pub const DEFAULT_MAX_FAILURES: u32 = 3;

    /// A breaker that trips after `max_failures` consecutive failures
    /// (at least one).
    pub fn new(max_failures: u32) -> Self {
        Self {
            max_failures: max_failures.max(1),
            failures: AtomicU32::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Current consecutive-failure count.
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Acquire)
    }

    pub fn max_failures(&self) -> u32 {
        self.max_failures
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Release);
    }

    /// Count a failure. Returns `true` only for the call that trips the
    /// breaker.
    pub fn record_failure(&self) -> bool {
        let count = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if count < self.max_failures {
            return false;
        }
        let just_tripped = self
            .tripped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if just_tripped {
            warn!(
                failures = count,
                "Knowledge service disabled after {count} consecutive failures; \
                 continuing without knowledge graph context"
            );
        }
        just_tripped
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_FAILURES)
    }
}
