//! Top-level error type for batch operations.
//!
//! Only batch-wide problems are errors. A request that fails on its own is
//! reported inside its [`DispatchResult`](crate::DispatchResult) unless the
//! batch was asked to abort on the first failure.

use thiserror::Error;

use crate::request::ValidationError;
use crate::transport::TransportInitError;

/// Errors that stop a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// An input item is malformed. Raised before anything is sent.
    #[error("invalid request item: {0}")]
    Validation(#[from] ValidationError),

    /// The configuration cannot be turned into a transport.
    #[error("invalid batch configuration: {0}")]
    TransportInit(#[from] TransportInitError),

    /// A request failed while the batch was set to abort on any failure.
    #[error("request failed: {error}")]
    Aborted {
        /// Position of the failed request in the batch.
        index: usize,
        /// URL of the failed request.
        url: String,
        /// Failure description from its result.
        error: String,
    },

    /// The dispatch stream ended before every request reported back.
    #[error("batch ended after {received} of {expected} results")]
    Incomplete {
        /// Number of requests in the batch.
        expected: usize,
        /// Number of results received.
        received: usize,
    },

    /// The blocking batcher could not start its runtime.
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
