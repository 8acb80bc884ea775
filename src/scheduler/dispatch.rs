//! Single-request execution.
//!
//! [`dispatch`] is the isolation boundary between the transport and the
//! scheduler: whatever goes wrong with one request ends up inside its
//! [`DispatchResult`], never as an error that could unwind a batch.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::result::DispatchResult;
use crate::transport::{InboundResponse, OutboundRequest, Transport, TransportError};

/// Why a single dispatch failed. Rendered into [`DispatchResult::error`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No response was obtained.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The final response had a non-2xx status.
    #[error("HTTP {status}{reason} from {url}")]
    Status {
        /// Final status code.
        status: u16,
        /// Canonical reason phrase, prefixed with a space, or empty.
        reason: String,
        /// Final URL after redirects.
        url: String,
    },

    /// The response body is not valid JSON.
    #[error("invalid JSON payload from {url}: {source}")]
    Decode {
        /// Final URL after redirects.
        url: String,
        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
}

impl DispatchError {
    fn status(status: u16, url: impl Into<String>) -> Self {
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .map(|reason| format!(" {reason}"))
            .unwrap_or_default();
        Self::Status {
            status,
            reason,
            url: url.into(),
        }
    }
}

/// Sends one request and folds the outcome into a [`DispatchResult`].
///
/// The result's `url` and `request_body` always describe the outbound
/// request, on both the success and the failure path.
pub async fn dispatch<T>(transport: &T, request: &OutboundRequest) -> DispatchResult
where
    T: Transport + ?Sized,
{
    let outcome = match transport.send(request).await {
        Ok(response) => decode(response),
        Err(e) => Err(DispatchError::from(e)),
    };

    match outcome {
        Ok(data) => {
            debug!(url = %request.url, "request succeeded");
            DispatchResult::success(&request.url, request.body.clone(), data)
        }
        Err(e) => {
            warn!(method = %request.method, url = %request.url, error = %e, "request failed");
            DispatchResult::failure(&request.url, request.body.clone(), e.to_string())
        }
    }
}

fn decode(response: InboundResponse) -> Result<Value, DispatchError> {
    if !response.is_success() {
        return Err(DispatchError::status(response.status, response.url));
    }
    serde_json::from_slice(&response.body).map_err(|source| DispatchError::Decode {
        url: response.url,
        source,
    })
}
