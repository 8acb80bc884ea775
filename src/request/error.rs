//! Error types for request item normalization.

use thiserror::Error;

/// Errors raised while turning input items into request descriptors.
///
/// These surface before any request is dispatched and abort the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A record-shaped item has no `url` key.
    #[error("request item {index} must contain a 'url' key\n  Suggestion: add \"url\" to the item")]
    MissingUrl {
        /// Position of the offending item in the batch.
        index: usize,
    },

    /// The URL is present but empty or blank.
    #[error("request item {index} has an empty URL")]
    EmptyUrl {
        /// Position of the offending item in the batch.
        index: usize,
    },

    /// A field has the wrong JSON type (for example a numeric `url`).
    #[error("request item {index}: field '{field}' must be {expected}")]
    InvalidField {
        /// Position of the offending item in the batch.
        index: usize,
        /// Field name.
        field: &'static str,
        /// Human description of the expected shape.
        expected: &'static str,
    },

    /// The method is not one of the standard HTTP verbs.
    #[error("request item {index}: unsupported HTTP method '{method}'\n  Suggestion: use GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS, TRACE or CONNECT")]
    UnsupportedMethod {
        /// Position of the offending item in the batch.
        index: usize,
        /// The method as given.
        method: String,
    },

    /// A header name or value cannot be sent over HTTP.
    #[error("request item {index}: invalid header '{name}': {reason}")]
    InvalidHeader {
        /// Position of the offending item in the batch.
        index: usize,
        /// Header name as given.
        name: String,
        /// Why the header was rejected.
        reason: String,
    },
}

impl ValidationError {
    /// Returns the batch index of the item that failed validation.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::MissingUrl { index }
            | Self::EmptyUrl { index }
            | Self::InvalidField { index, .. }
            | Self::UnsupportedMethod { index, .. }
            | Self::InvalidHeader { index, .. } => *index,
        }
    }
}
