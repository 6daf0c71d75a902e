//! Ingress rate limiting.
//!
//! A single token bucket shared by all requests. It sits in front of
//! authentication so that guessing tokens is throttled as well.

use std::time::Instant;

use parking_lot::Mutex;

/// Token bucket with continuous refill.
///
/// Holds at most `capacity` tokens and gains `rate_per_sec` tokens per
/// second. Each accepted request consumes one token.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket that starts full. A `burst` of 0 means "same as the rate".
    pub fn new(rate_per_sec: u32, burst: u32) -> Self {
        let capacity = if burst == 0 { rate_per_sec } else { burst }.max(1);
        Self {
            capacity: f64::from(capacity),
            rate_per_sec: f64::from(rate_per_sec),
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Build from configuration; `None` when rate limiting is disabled.
    pub fn from_settings(rate_per_sec: u32, burst: u32) -> Option<Self> {
        (rate_per_sec > 0).then(|| Self::new(rate_per_sec, burst))
    }

    /// Take one token if available.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock();

        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
