//! Transport abstraction the scheduler dispatches through.
//!
//! A [`Connector`] opens a [`Transport`] from [`TransportSettings`]; the
//! transport builds outbound requests (pure) and sends them (I/O). The
//! production implementation is [`HttpConnector`], backed by a pooled
//! `reqwest` client. Tests substitute their own connector to observe
//! concurrency and timing without a network.
//!
//! A transport is closed by dropping it. The batcher holds the only owner
//! behind an `Arc` for the duration of one batch, so every opened transport
//! is released exactly once, including on error and abort paths.

mod client;
mod error;
mod retry;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use url::Url;

use crate::request::RequestDescriptor;

pub use client::{HttpConnector, HttpTransport, MAX_REDIRECTS};
pub use error::{TransportError, TransportInitError};
pub use retry::{
    FailureType, MAX_RETRY_AFTER, RetryDecision, RetryPolicy, classify_error, classify_status,
    is_idempotent, parse_retry_after, restrict_for_method,
};

/// Settings a transport is opened with.
///
/// Derived from [`BatchConfig`](crate::BatchConfig) plus any per-call
/// timeout override.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportSettings {
    /// Base URL relative request URLs are joined onto.
    pub base_url: Option<Url>,
    /// Cap on pooled connections kept per host.
    pub max_connections: Option<usize>,
    /// Total per-request timeout.
    pub timeout: Option<Duration>,
    /// Extra attempts for transient failures.
    pub retry_attempts: u32,
    /// Negotiate HTTP/2 when the server offers it.
    pub use_http2: bool,
}

/// A fully built request, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL after base URL resolution.
    pub url: String,
    /// Serialized JSON body.
    pub body: Option<String>,
    /// Request headers.
    pub headers: HeaderMap,
}

/// The response to an [`OutboundRequest`], after redirects and retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundResponse {
    /// Final HTTP status.
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl InboundResponse {
    /// Returns true for 2xx statuses.
    ///
    /// A 3xx left over after redirects (such as `300 Multiple Choices` or a
    /// redirect past the limit) is not a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

/// A pooled HTTP client shared by every dispatch of one batch.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Builds the outbound form of a descriptor. Performs no I/O.
    fn build_request(&self, descriptor: &RequestDescriptor) -> OutboundRequest;

    /// Sends a request, retrying transient failures and following redirects.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when no response could be obtained.
    /// Error statuses are returned as responses, not errors.
    async fn send(&self, request: &OutboundRequest) -> Result<InboundResponse, TransportError>;
}

/// Opens transports.
pub trait Connector: Send + Sync {
    /// The transport type this connector opens.
    type Transport: Transport + 'static;

    /// Opens a transport with the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportInitError`] when the settings cannot be honored.
    fn open(&self, settings: &TransportSettings) -> Result<Self::Transport, TransportInitError>;
}

/// Builds an [`OutboundRequest`] from a descriptor, resolving it against `base_url`.
///
/// Shared by transports so base URL handling and body serialization stay
/// identical across implementations.
#[must_use]
pub fn build_outbound(base_url: Option<&Url>, descriptor: &RequestDescriptor) -> OutboundRequest {
    OutboundRequest {
        method: descriptor.method.clone(),
        url: resolve_url(base_url, &descriptor.url),
        body: descriptor.body.as_ref().map(ToString::to_string),
        headers: descriptor.headers.clone(),
    }
}

/// Resolves a request URL against an optional base URL.
///
/// Absolute `http` and `https` URLs are returned unchanged. Anything else is
/// appended to the base path, so `https://h/api` with `/users` becomes
/// `https://h/api/users`, and `users:1` becomes `https://h/api/users:1`.
///
/// # Examples
///
/// ```
/// use abatcher_core::transport::resolve_url;
/// use url::Url;
///
/// let base = Url::parse("https://api.example.com/v1").unwrap();
/// assert_eq!(resolve_url(Some(&base), "/users"), "https://api.example.com/v1/users");
/// assert_eq!(resolve_url(Some(&base), "https://other.test/x"), "https://other.test/x");
/// assert_eq!(resolve_url(None, "relative"), "relative");
/// ```
#[must_use]
pub fn resolve_url(base_url: Option<&Url>, url: &str) -> String {
    if Url::parse(url).is_ok_and(|parsed| matches!(parsed.scheme(), "http" | "https")) {
        return url.to_string();
    }
    let Some(base) = base_url else {
        return url.to_string();
    };

    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    // "./" keeps `users:1` from parsing as a scheme.
    base.join(&format!("./{}", url.trim_start_matches('/')))
        .map_or_else(|_| url.to_string(), String::from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn base(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    #[test]
    fn test_resolve_url_absolute_bypasses_base() {
        let base = base("https://api.test/v1/");
        assert_eq!(
            resolve_url(Some(&base), "http://elsewhere.test/a?b=1"),
            "http://elsewhere.test/a?b=1"
        );
    }

    #[test]
    fn test_resolve_url_scheme_like_relative_joins_base() {
        let base = base("https://api.test/v1");
        assert_eq!(resolve_url(Some(&base), "users:1"), "https://api.test/v1/users:1");
        assert_eq!(
            resolve_url(Some(&base), "localhost:8080/x"),
            "https://api.test/v1/localhost:8080/x"
        );
    }

    #[test]
    fn test_resolve_url_keeps_base_path() {
        let base = base("https://api.test/v1");
        assert_eq!(resolve_url(Some(&base), "users/1"), "https://api.test/v1/users/1");
        assert_eq!(resolve_url(Some(&base), "/users/1"), "https://api.test/v1/users/1");
    }

    #[test]
    fn test_resolve_url_base_with_trailing_slash() {
        let base = base("https://api.test/v1/");
        assert_eq!(resolve_url(Some(&base), "/items"), "https://api.test/v1/items");
    }

    #[test]
    fn test_resolve_url_root_base() {
        let base = base("https://api.test");
        assert_eq!(resolve_url(Some(&base), "/ping?x=1"), "https://api.test/ping?x=1");
    }

    #[test]
    fn test_resolve_url_relative_without_base_unchanged() {
        assert_eq!(resolve_url(None, "/users"), "/users");
    }

    #[test]
    fn test_build_outbound_serializes_body() {
        let mut descriptor = RequestDescriptor::new(Method::POST, "/post");
        descriptor.body = Some(json!({"name": "Test"}));
        let request = build_outbound(Some(&base("https://httpbin.test")), &descriptor);
        assert_eq!(request.url, "https://httpbin.test/post");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"Test"}"#));
    }

    #[test]
    fn test_build_outbound_without_body() {
        let descriptor = RequestDescriptor::new(Method::GET, "https://x.test/");
        let request = build_outbound(None, &descriptor);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_inbound_response_success_range() {
        let response = |status| InboundResponse {
            status,
            url: String::new(),
            body: Vec::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(300).is_success());
        assert!(!response(302).is_success());
        assert!(!response(101).is_success());
        assert!(!response(404).is_success());
        assert!(!response(500).is_success());
    }
}
