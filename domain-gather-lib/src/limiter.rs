//! Process-wide token bucket for RDAP requests.
//!
//! All RDAP calls in a process share one limiter instance. Callers reserve a
//! token, learn how long to wait before proceeding, and must return the token
//! if they abandon the reservation, otherwise concurrent workers starve when
//! contexts cancel.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Token bucket refilling at a steady rate with bounded burst capacity.
#[derive(Debug)]
pub struct RdapLimiter {
    state: Mutex<State>,
    rate: f64,
    burst: f64,
}

#[derive(Debug)]
struct State {
    tokens: f64,
    updated: Instant,
}

/// A debited token. Wait [`delay`](Reservation::delay) before proceeding, or
/// [`cancel`](Reservation::cancel) to refund the token.
#[derive(Debug)]
#[must_use = "a reservation must either be waited on or cancelled"]
pub struct Reservation<'a> {
    limiter: &'a RdapLimiter,
    delay: Duration,
}

impl RdapLimiter {
    /// Create a limiter producing `rate_per_sec` tokens per second with the
    /// given burst capacity. The bucket starts full.
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            state: Mutex::new(State {
                tokens: burst,
                updated: Instant::now(),
            }),
            rate: rate_per_sec.max(f64::MIN_POSITIVE),
            burst,
        }
    }

    /// Debit one token and report how long the caller must wait for it.
    ///
    /// The balance may go negative; the projected wait is the time until it
    /// reaches zero again.
    pub fn reserve(&self) -> Reservation<'_> {
        let mut state = self.lock();
        let now = Instant::now();
        self.refill(&mut state, now);
        state.tokens -= 1.0;
        let delay = if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / self.rate)
        };
        Reservation {
            limiter: self,
            delay,
        }
    }

    fn refund(&self) {
        let mut state = self.lock();
        let now = Instant::now();
        self.refill(&mut state, now);
        state.tokens = (state.tokens + 1.0).min(self.burst);
    }

    fn refill(&self, state: &mut State, now: Instant) {
        let elapsed = now.saturating_duration_since(state.updated);
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
        state.updated = now;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // a poisoned lock only means a panic elsewhere; the counters stay valid
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Reservation<'_> {
    /// How long the caller must wait before acting on the token.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Return the token to the bucket.
    pub fn cancel(self) {
        self.limiter.refund();
    }
}
