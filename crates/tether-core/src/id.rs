//! Correlation ID allocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates correlation IDs for outbound requests.
///
/// IDs are strictly increasing starting at 1. When the next value would
/// exceed the configured maximum, the counter restarts from 1. The whole
/// advance - including the wraparound - is a single compare-exchange, so two
/// callers can never observe the bound together and both reset, or one
/// re-issue a value the other just produced.
///
/// Distinctness holds among concurrently issued IDs as long as the number of
/// calls in flight stays below the maximum; callers configure the bound
/// accordingly.
#[derive(Debug)]
pub struct RequestIdAllocator {
    counter: AtomicU64,
    max: u64,
}

impl RequestIdAllocator {
    /// Create an allocator that wraps around after `max`.
    pub fn new(max: u64) -> Self {
        Self {
            counter: AtomicU64::new(0),
            max: max.max(1),
        }
    }

    /// Issue the next correlation ID.
    pub fn next(&self) -> u64 {
        let mut current = self.counter.load(Ordering::Relaxed);
        loop {
            let next = if current >= self.max { 1 } else { current + 1 };
            match self.counter.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    /// The configured wraparound bound.
    pub fn max(&self) -> u64 {
        self.max
    }
}

impl Default for RequestIdAllocator {
    fn default() -> Self {
        Self::new(crate::config::RpcConfig::DEFAULT_MAX_REQUEST_ID)
    }
}
