//! Time source and bounded retry helpers.
//!
//! Everything that waits between attempts goes through a [`Clock`] so
//! tests can substitute one that records the requested delays and
//! returns immediately.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping on the tokio timer.
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A fixed number of attempts separated by a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Runs `op` until it succeeds, fails with an error `retryable`
    /// rejects, or the attempts run out. The last error is returned.
    pub async fn retry<T, E, F, Fut, P>(&self, clock: &dyn Clock, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    attempt += 1;
                    clock.sleep(self.delay).await;
                }
                other => return other,
            }
        }
    }

    /// Calls `probe` until it yields a value. `Ok(None)` means every
    /// attempt came back empty; probe errors abort immediately.
    pub async fn poll<T, E, F, Fut>(&self, clock: &dyn Clock, mut probe: F) -> Result<Option<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Option<T>, E>>,
    {
        let attempts = self.max_attempts.max(1);
        for attempt in 1..=attempts {
            if let Some(value) = probe(attempt).await? {
                return Ok(Some(value));
            }
            if attempt < attempts {
                clock.sleep(self.delay).await;
            }
        }
        Ok(None)
    }
}
