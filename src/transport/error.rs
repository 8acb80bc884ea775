//! Error types for the transport layer.

use std::time::Duration;

use thiserror::Error;

/// Errors raised when a transport cannot be opened from its configuration.
#[derive(Debug, Error)]
pub enum TransportInitError {
    /// The base URL does not parse or cannot have paths joined onto it.
    #[error("invalid base URL '{url}': {reason}\n  Suggestion: use an absolute http:// or https:// URL")]
    InvalidBaseUrl {
        /// The base URL as configured.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A numeric limit is zero, negative or not finite.
    #[error("invalid value for `{name}`: {value} (must be a positive number)")]
    InvalidLimit {
        /// Configuration key.
        name: &'static str,
        /// Offending value, rendered for display.
        value: String,
    },

    /// The request timeout is zero.
    #[error("invalid timeout {timeout:?}: must be greater than zero")]
    InvalidTimeout {
        /// Offending timeout.
        timeout: Duration,
    },

    /// The underlying HTTP client refused the configuration.
    #[error("failed to build HTTP client: {source}")]
    Client {
        /// Error reported by the client builder.
        #[source]
        source: reqwest::Error,
    },
}

impl TransportInitError {
    /// Creates an invalid-limit error.
    pub fn invalid_limit(name: &'static str, value: impl ToString) -> Self {
        Self::InvalidLimit {
            name,
            value: value.to_string(),
        }
    }
}

/// Errors from a single `send` that produced no HTTP response.
///
/// Responses with error statuses are not transport errors; they are returned
/// to the caller, which decides how to treat them.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before a response arrived.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The resolved URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The response body could not be read.
    #[error("failed to read response body from {url}: {source}")]
    Body {
        /// The URL whose body failed.
        url: String,
        /// The underlying read error.
        #[source]
        source: reqwest::Error,
    },
}

impl TransportError {
    /// Creates a network error from a reqwest error, folding timeouts into [`Self::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Returns true when the connection could not be established, so the
    /// request never reached the server.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Network { source, .. } if source.is_connect())
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a body read error.
    pub fn body(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Body {
            url: url.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_error_display() {
        let err = TransportError::timeout("https://example.com/slow");
        assert_eq!(err.to_string(), "timeout requesting https://example.com/slow");
    }

    #[test]
    fn test_invalid_url_error_display() {
        let err = TransportError::invalid_url("not a url");
        assert!(err.to_string().contains("not a url"));
    }

    #[test]
    fn test_invalid_limit_display() {
        let err = TransportInitError::invalid_limit("max_concurrent", 0);
        let msg = err.to_string();
        assert!(msg.contains("max_concurrent"));
        assert!(msg.contains('0'));
    }

    #[test]
    fn test_invalid_base_url_has_suggestion() {
        let err = TransportInitError::InvalidBaseUrl {
            url: "::".to_string(),
            reason: "relative URL without a base".to_string(),
        };
        assert!(err.to_string().contains("Suggestion"));
    }

    #[test]
    fn test_invalid_timeout_display() {
        let err = TransportInitError::InvalidTimeout {
            timeout: Duration::ZERO,
        };
        assert!(err.to_string().contains("greater than zero"));
    }
}
