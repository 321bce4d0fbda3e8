//! Single process-wide rate limiter (§4.3): `R` permits per second, handed
//! out by a dedicated pacer task so every worker shares one clock.
//!
//! Built on a [`tokio::sync::Semaphore`] rather than a manual
//! `can_send`/`delay_until_next` poll loop: `Semaphore::acquire` is
//! cancel-safe — a dropped acquire future gives its permit slot back
//! without having consumed a pacer tick — which is exactly what "must return
//! promptly when cancelled, without consuming a permit" requires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinHandle;

/// Ceiling on requested permits/sec; higher values refuse to start (§4.3).
pub const SAFETY_CAP: u32 = 15_000;

/// A running pacer and the semaphore workers acquire permits from.
///
/// `rate <= 0` disables throttling entirely: `acquire` always succeeds
/// immediately and no pacer task is spawned.
pub struct RateLimiter {
    semaphore: Option<Arc<Semaphore>>,
    pacer: Option<JoinHandle<()>>,
}

impl RateLimiter {
    /// Starts a new limiter. `rate` is permits per second; `<= 0` disables
    /// throttling. Panics if `rate > SAFETY_CAP` — callers must validate
    /// configuration before constructing one (see `config.rs`).
    pub fn start(rate: i64) -> Self {
        if rate <= 0 {
            return Self { semaphore: None, pacer: None };
        }
        assert!(
            u32::try_from(rate).is_ok_and(|rate| rate <= SAFETY_CAP),
            "rate limiter started with rate {rate} exceeding the safety cap {SAFETY_CAP}"
        );

        let semaphore = Arc::new(Semaphore::new(0));
        let period = Duration::from_secs(1) / rate as u32;
        let pacer_semaphore = Arc::clone(&semaphore);
        let pacer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                pacer_semaphore.add_permits(1);
            }
        });

        Self { semaphore: Some(semaphore), pacer: Some(pacer) }
    }

    /// Waits for a permit. Cancel-safe: dropping the returned future (or the
    /// caller's enclosing future, e.g. on `select!` cancellation) returns the
    /// permit slot to the semaphore without having consumed a pacer tick.
    pub async fn acquire(&self) -> Result<(), AcquireError> {
        let Some(semaphore) = &self.semaphore else {
            return Ok(());
        };
        semaphore.acquire().await?.forget();
        Ok(())
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(pacer) = self.pacer.take() {
            pacer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_limiter_never_blocks() {
        let limiter = RateLimiter::start(0);
        for _ in 0..1000 {
            limiter.acquire().await.unwrap();
        }
    }

    #[tokio::test]
    async fn enabled_limiter_paces_permits() {
        let limiter = RateLimiter::start(1000);
        let start = tokio::time::Instant::now();
        for _ in 0..5 {
            limiter.acquire().await.unwrap();
        }
        // five permits at 1000/sec should take a few milliseconds, not be instant.
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    #[should_panic(expected = "exceeding the safety cap")]
    fn rejects_rate_above_safety_cap() {
        let _ = RateLimiter::start(15_001);
    }
}
