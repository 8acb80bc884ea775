//! `reqwest`-backed transport.
//!
//! One [`HttpTransport`] wraps one pooled `reqwest::Client`. It is created
//! per batch so per-call settings (such as a timeout override) apply to that
//! batch only, and dropped when the batch finishes, releasing its
//! connections.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue, RETRY_AFTER};
use reqwest::{Client, ClientBuilder, redirect};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::retry::{
    RetryDecision, RetryPolicy, classify_error, classify_status, restrict_for_method,
};
use super::{
    Connector, InboundResponse, OutboundRequest, Transport, TransportError, TransportInitError,
    TransportSettings, build_outbound, parse_retry_after,
};
use crate::request::RequestDescriptor;
use crate::user_agent;

/// Maximum number of redirects followed per request.
pub const MAX_REDIRECTS: usize = 10;

/// Connect timeout applied when no total timeout is configured.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Opens [`HttpTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    type Transport = HttpTransport;

    fn open(&self, settings: &TransportSettings) -> Result<HttpTransport, TransportInitError> {
        HttpTransport::open(settings)
    }
}

/// Pooled HTTP transport.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: Option<Url>,
    retry_policy: RetryPolicy,
}

impl HttpTransport {
    /// Opens a transport with a fresh connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`TransportInitError::InvalidTimeout`] for a zero timeout and
    /// [`TransportInitError::Client`] when the client cannot be built.
    #[instrument(level = "debug", skip(settings), fields(base_url = ?settings.base_url.as_ref().map(Url::as_str)))]
    pub fn open(settings: &TransportSettings) -> Result<Self, TransportInitError> {
        let client = build_client(settings)?;
        debug!(
            http2 = settings.use_http2,
            max_connections = ?settings.max_connections,
            timeout_ms = settings.timeout.map(|t| t.as_millis()),
            retry_attempts = settings.retry_attempts,
            "opened transport"
        );
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            retry_policy: RetryPolicy::from_retry_attempts(settings.retry_attempts),
        })
    }

    /// Returns the retry policy applied to every send.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    async fn send_once(
        &self,
        request: &OutboundRequest,
    ) -> Result<(InboundResponse, Option<Duration>), TransportError> {
        let url = Url::parse(&request.url).map_err(|_| TransportError::invalid_url(&request.url))?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::network(&request.url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let retry_after = if matches!(status, 429 | 503) {
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after)
        } else {
            None
        };
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::body(&final_url, e))?
            .to_vec();

        Ok((
            InboundResponse {
                status,
                url: final_url,
                body,
            },
            retry_after,
        ))
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        debug!("closing transport");
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn build_request(&self, descriptor: &RequestDescriptor) -> OutboundRequest {
        build_outbound(self.base_url.as_ref(), descriptor)
    }

    #[instrument(level = "debug", skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: &OutboundRequest) -> Result<InboundResponse, TransportError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let (failure_type, retry_after, outcome) = match self.send_once(request).await {
                Ok((response, retry_after)) => match classify_status(response.status) {
                    None => return Ok(response),
                    Some(failure_type) => (failure_type, retry_after, Ok(response)),
                },
                Err(e) => (classify_error(&e), None, Err(e)),
            };
            let not_sent = outcome.as_ref().is_err_and(TransportError::is_connect);
            let failure_type = restrict_for_method(failure_type, &request.method, not_sent);

            match self.retry_policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let delay = retry_after.unwrap_or(backoff_delay);
                    info!(
                        url = %request.url,
                        attempt = next_attempt,
                        max_attempts = self.retry_policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        using_retry_after = retry_after.is_some(),
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    if attempt > 1 {
                        warn!(url = %request.url, attempt, %reason, "giving up on request");
                    } else {
                        debug!(url = %request.url, %reason, "not retrying request");
                    }
                    return outcome;
                }
            }
        }
    }
}

fn build_client(settings: &TransportSettings) -> Result<Client, TransportInitError> {
    let mut builder = ClientBuilder::new()
        .user_agent(user_agent::default_user_agent())
        .redirect(redirect::Policy::limited(MAX_REDIRECTS))
        .gzip(true);

    if let Some(timeout) = settings.timeout {
        if timeout.is_zero() {
            return Err(TransportInitError::InvalidTimeout { timeout });
        }
        builder = builder.timeout(timeout).connect_timeout(timeout);
    } else {
        builder = builder.connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));
    }

    if let Some(max_connections) = settings.max_connections {
        if max_connections == 0 {
            return Err(TransportInitError::invalid_limit("max_connections", 0));
        }
        builder = builder.pool_max_idle_per_host(max_connections);
    }

    if !settings.use_http2 {
        builder = builder.http1_only();
    }

    builder
        .build()
        .map_err(|source| TransportInitError::Client { source })
}
