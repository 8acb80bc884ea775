//! Start-rate limiting for dispatches.
//!
//! [`RateLimiter`] spaces dispatch starts evenly. For a rate `R` of at least
//! one per second, consecutive starts are at least `1 / floor(R)` seconds
//! apart, so any one-second window contains at most `floor(R)` starts. A
//! fractional part above one is rounded down: `2.5` behaves like `2.0`.
//!
//! Rates below one are used as-is: starts are `1 / R` seconds apart, so a
//! one-second window holds at most one start and any `1 / R` window holds
//! exactly one.
//!
//! Admission is FIFO: waiters queue on a fair `tokio::sync::Mutex`.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use abatcher_core::scheduler::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::per_second(4.0);
//! assert_eq!(limiter.interval(), Some(Duration::from_millis(250)));
//!
//! // First start is immediate, the second waits ~250ms.
//! limiter.acquire().await;
//! limiter.acquire().await;
//! # }
//! ```

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument};

/// Spaces dispatch starts to a maximum rate.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum spacing between starts; `None` disables limiting.
    interval: Option<Duration>,

    /// Time of the most recent start.
    /// `None` until the first start, which is never delayed.
    last_start: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter admitting at most `rate` starts per second.
    ///
    /// Rates of one or more are rounded down to a whole number of starts.
    /// Non-positive or non-finite rates produce a disabled limiter; callers
    /// validate rates before constructing one.
    #[must_use]
    #[instrument(level = "debug")]
    pub fn per_second(rate: f64) -> Self {
        if !(rate.is_finite() && rate > 0.0) {
            debug!("non-positive rate, rate limiting disabled");
            return Self::disabled();
        }
        let effective = if rate >= 1.0 { rate.floor() } else { rate };
        let interval = Duration::try_from_secs_f64(effective.recip()).unwrap_or(Duration::MAX);
        debug!(interval_ms = interval.as_millis(), "creating rate limiter");
        Self {
            interval: Some(interval),
            last_start: Mutex::new(None),
        }
    }

    /// Creates a limiter that never delays.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            interval: None,
            last_start: Mutex::new(None),
        }
    }

    /// Creates a limiter from an optional rate.
    #[must_use]
    pub fn from_rate(rate: Option<f64>) -> Self {
        rate.map_or_else(Self::disabled, Self::per_second)
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.interval.is_none()
    }

    /// Returns the minimum spacing between starts.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Waits until another start is allowed, then records it.
    pub async fn acquire(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        // Held across the sleep so later callers queue behind this one.
        let mut last_start = self.last_start.lock().await;

        if let Some(previous) = *last_start {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                let delay = interval - elapsed;
                debug!(delay_ms = delay.as_millis(), "applying rate limit delay");
                tokio::time::sleep(delay).await;
            }
        }

        *last_start = Some(Instant::now());
    }
}
