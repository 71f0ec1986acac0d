//! Bounded retry for backend calls
//!
//! Persistence calls never retry forever: a small number of attempts with a
//! linearly growing, capped delay, then the failure propagates and the
//! caller's fail-closed handling takes over. Only persistence errors are
//! retried; validation and capability errors fail immediately.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{LedgerError, Result};

/// Retry discipline for one session's backend calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Zero-delay policy for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Linear backoff, capped: base, 2*base, 3*base, ... up to max_delay
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(self.max_delay)
    }

    /// Run `op` until it succeeds or attempts are exhausted
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(LedgerError::Persistence(message)) if attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "backend call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
