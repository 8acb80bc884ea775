//! Bounded retries with exponential backoff for transient transport failures.
//!
//! A failed attempt is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - may succeed on retry (connection errors, timeouts, 5xx)
//! - [`FailureType::RateLimited`] - HTTP 429; retried, honoring `Retry-After` when present
//! - [`FailureType::Permanent`] - retrying would not help (4xx, bad URL, TLS errors)
//!
//! [`RetryPolicy`] then decides whether another attempt is allowed and how
//! long to wait before it.
//!
//! Non-idempotent methods (`POST`, `PATCH`, `CONNECT`, extensions) are only
//! retried when the request never reached the server: connection failures
//! and `429`. A timeout or `5xx` on a `POST` is final, see
//! [`restrict_for_method`].
//!
//! # Example
//!
//! ```
//! use abatcher_core::transport::{FailureType, RetryDecision, RetryPolicy, classify_status};
//!
//! let policy = RetryPolicy::from_retry_attempts(2);
//! assert_eq!(policy.max_attempts(), 3);
//!
//! let failure = classify_status(503).unwrap();
//! assert!(matches!(policy.should_retry(failure, 1), RetryDecision::Retry { attempt: 2, .. }));
//! assert!(matches!(policy.should_retry(failure, 3), RetryDecision::DoNotRetry { .. }));
//! assert!(matches!(
//!     policy.should_retry(FailureType::Permanent, 1),
//!     RetryDecision::DoNotRetry { .. }
//! ));
//! ```

use std::time::Duration;

use rand::Rng;
use reqwest::Method;
use tracing::{debug, instrument, warn};

use super::TransportError;

/// Base delay for exponential backoff.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Maximum backoff delay cap.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

/// Backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to delays.
const MAX_JITTER: Duration = Duration::from_millis(250);

/// Maximum honored Retry-After value.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,

    /// Failure that won't succeed regardless of retries.
    Permanent,

    /// Server rate limiting (HTTP 429).
    RateLimited,
}

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Retry behavior with exponential backoff.
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Maximum delay cap.
    max_delay: Duration,

    /// Multiplier applied each attempt.
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    /// A single attempt with no retries.
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_attempts` includes the initial attempt and is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy allowing `retry_attempts` retries after the first attempt.
    #[must_use]
    pub fn from_retry_attempts(retry_attempts: u32) -> Self {
        Self {
            max_attempts: retry_attempts.saturating_add(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.calculate_delay(attempt),
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = (base_ms * multiplier.powf(exponent)).min(self.max_delay.as_millis() as f64);

        Duration::from_millis(delay_ms as u64) + jitter()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn jitter() -> Duration {
    let jitter_ms = rand::thread_rng().gen_range(0..=MAX_JITTER.as_millis() as u64);
    Duration::from_millis(jitter_ms)
}

/// Classifies a transport error.
///
/// TLS and certificate errors and malformed URLs are permanent; other network
/// errors and timeouts are transient.
#[must_use]
pub fn classify_error(error: &TransportError) -> FailureType {
    match error {
        TransportError::Timeout { .. } | TransportError::Body { .. } => FailureType::Transient,
        TransportError::Network { source, .. } => {
            if is_tls_error(source) || source.is_builder() || source.is_redirect() {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        TransportError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

/// Returns whether repeating `method` has the same effect as sending it once.
#[must_use]
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS | Method::TRACE
    )
}

/// Narrows a failure classification for the request's method.
///
/// Transient failures of non-idempotent requests become permanent unless
/// the request was never delivered (`not_sent`), since the server may
/// already have acted on it.
#[must_use]
pub fn restrict_for_method(failure_type: FailureType, method: &Method, not_sent: bool) -> FailureType {
    if failure_type == FailureType::Transient && !not_sent && !is_idempotent(method) {
        FailureType::Permanent
    } else {
        failure_type
    }
}

/// Classifies a response status for retrying, returning `None` for statuses
/// that are never retried as failures (1xx, 2xx and 3xx).
#[must_use]
#[allow(clippy::match_same_arms)]
pub fn classify_status(status: u16) -> Option<FailureType> {
    match status {
        100..=399 => None,
        408 => Some(FailureType::Transient),
        429 => Some(FailureType::RateLimited),
        400..=499 => Some(FailureType::Permanent),
        500..=599 => Some(FailureType::Transient),
        _ => Some(FailureType::Permanent),
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("certificate")
        || error_string.contains("tls")
        || error_string.contains("ssl")
        || error_string.contains("handshake")
}

/// Parses a Retry-After header value.
///
/// Accepts integer seconds or an HTTP-date. Values above [`MAX_RETRY_AFTER`]
/// are capped; dates in the past yield zero.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use abatcher_core::transport::parse_retry_after;
///
/// assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
/// assert_eq!(parse_retry_after("invalid"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let seconds = u64::try_from(seconds).ok()?;
        return Some(cap_retry_after(Duration::from_secs(seconds)));
    }

    let datetime = httpdate::parse_http_date(header_value).ok()?;
    let delay = datetime
        .duration_since(std::time::SystemTime::now())
        .unwrap_or(Duration::ZERO);
    Some(cap_retry_after(delay))
}

fn cap_retry_after(delay: Duration) -> Duration {
    if delay > MAX_RETRY_AFTER {
        warn!(
            delay_secs = delay.as_secs(),
            max_secs = MAX_RETRY_AFTER.as_secs(),
            "Retry-After exceeds maximum, capping"
        );
        return MAX_RETRY_AFTER;
    }
    delay
}
