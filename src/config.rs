//! Batch configuration.
//!
//! [`BatchConfig`] is fixed for the lifetime of a batcher. It can be built in
//! code or deserialized from JSON, where the timeout is given in seconds:
//!
//! ```
//! use std::time::Duration;
//! use abatcher_core::BatchConfig;
//!
//! let config: BatchConfig = serde_json::from_str(r#"{
//!     "base_url": "https://api.example.com/v1",
//!     "max_concurrent": 8,
//!     "max_per_second": 20,
//!     "timeout_secs": 2.5
//! }"#).unwrap();
//!
//! assert_eq!(config.max_concurrent, Some(8));
//! assert_eq!(config.timeout, Some(Duration::from_millis(2500)));
//! assert!(config.validate().is_ok());
//! ```

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::scheduler::Scheduler;
use crate::transport::{TransportInitError, TransportSettings};

/// Configuration shared by every batch a batcher runs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Base URL relative request URLs are resolved against.
    pub base_url: Option<String>,
    /// Maximum requests in flight at once (unbounded when unset).
    pub max_concurrent: Option<usize>,
    /// Maximum request starts per second (unbounded when unset).
    pub max_per_second: Option<f64>,
    /// Maximum pooled connections kept per host.
    pub max_connections: Option<usize>,
    /// Per-request timeout.
    #[serde(rename = "timeout_secs", deserialize_with = "deserialize_secs")]
    pub timeout: Option<Duration>,
    /// Extra attempts for transient failures.
    pub retry_attempts: Option<u32>,
    /// Negotiate HTTP/2 when offered.
    pub use_http2: bool,
    /// Abort a batch on its first failed request.
    pub raise_on_any_failure: bool,
}

impl BatchConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the in-flight limit.
    #[must_use]
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    /// Sets the start-rate limit.
    #[must_use]
    pub fn with_max_per_second(mut self, max_per_second: f64) -> Self {
        self.max_per_second = Some(max_per_second);
        self
    }

    /// Sets the per-host pool limit.
    #[must_use]
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = Some(max_connections);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the number of retries for transient failures.
    #[must_use]
    pub fn with_retry_attempts(mut self, retry_attempts: u32) -> Self {
        self.retry_attempts = Some(retry_attempts);
        self
    }

    /// Enables or disables HTTP/2 negotiation.
    #[must_use]
    pub fn with_http2(mut self, use_http2: bool) -> Self {
        self.use_http2 = use_http2;
        self
    }

    /// Enables or disables aborting on the first failure.
    #[must_use]
    pub fn with_raise_on_any_failure(mut self, raise: bool) -> Self {
        self.raise_on_any_failure = raise;
        self
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`TransportInitError`] for zero limits, a non-positive or
    /// non-finite rate, a zero timeout, or a base URL that is not absolute.
    pub fn validate(&self) -> Result<(), TransportInitError> {
        if self.max_concurrent == Some(0) {
            return Err(TransportInitError::invalid_limit("max_concurrent", 0));
        }
        if let Some(rate) = self.max_per_second
            && !(rate.is_finite() && rate > 0.0)
        {
            return Err(TransportInitError::invalid_limit("max_per_second", rate));
        }
        if self.max_connections == Some(0) {
            return Err(TransportInitError::invalid_limit("max_connections", 0));
        }
        validate_timeout(self.timeout)?;
        self.parsed_base_url()?;
        Ok(())
    }

    /// Returns the scheduler limits described by this configuration.
    #[must_use]
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            self.max_concurrent.and_then(NonZeroUsize::new),
            self.max_per_second,
        )
    }

    /// Returns transport settings, applying an optional per-call timeout override.
    ///
    /// # Errors
    ///
    /// Returns [`TransportInitError`] when the base URL or the effective
    /// timeout is invalid.
    pub fn transport_settings(
        &self,
        timeout_override: Option<Duration>,
    ) -> Result<TransportSettings, TransportInitError> {
        let timeout = timeout_override.or(self.timeout);
        validate_timeout(timeout)?;
        Ok(TransportSettings {
            base_url: self.parsed_base_url()?,
            max_connections: self.max_connections,
            timeout,
            retry_attempts: self.retry_attempts.unwrap_or(0),
            use_http2: self.use_http2,
        })
    }

    fn parsed_base_url(&self) -> Result<Option<Url>, TransportInitError> {
        let Some(raw) = self.base_url.as_deref() else {
            return Ok(None);
        };
        let url = Url::parse(raw).map_err(|e| TransportInitError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(TransportInitError::InvalidBaseUrl {
                url: raw.to_string(),
                reason: "URL cannot have paths joined onto it".to_string(),
            });
        }
        Ok(Some(url))
    }
}

fn validate_timeout(timeout: Option<Duration>) -> Result<(), TransportInitError> {
    match timeout {
        Some(timeout) if timeout.is_zero() => Err(TransportInitError::InvalidTimeout { timeout }),
        _ => Ok(()),
    }
}

fn deserialize_secs<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(secs) = Option::<f64>::deserialize(deserializer)? else {
        return Ok(None);
    };
    Duration::try_from_secs_f64(secs)
        .map(Some)
        .map_err(|e| serde::de::Error::custom(format!("invalid timeout_secs {secs}: {e}")))
}
