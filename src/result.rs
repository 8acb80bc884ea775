//! Per-request results.
//!
//! Every dispatched request produces exactly one [`DispatchResult`]. Failures
//! are data, not errors: a network error or a 404 on one request becomes a
//! [`Outcome::Failure`] and never disturbs its siblings.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

/// What happened to one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The request succeeded; holds the decoded JSON payload.
    Success(Value),
    /// The request failed; holds a human-readable description.
    Failure(String),
}

/// The result of one dispatch.
///
/// Serializes to JSON as `{"success", "url", "request_body", "data" | "error"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    url: String,
    request_body: Option<String>,
    outcome: Outcome,
}

impl DispatchResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(url: impl Into<String>, request_body: Option<String>, data: Value) -> Self {
        Self {
            url: url.into(),
            request_body,
            outcome: Outcome::Success(data),
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(
        url: impl Into<String>,
        request_body: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            request_body,
            outcome: Outcome::Failure(error.into()),
        }
    }

    /// Returns true if the request succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    /// Returns the request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the serialized request body, if one was sent.
    #[must_use]
    pub fn request_body(&self) -> Option<&str> {
        self.request_body.as_deref()
    }

    /// Returns the decoded payload of a successful request.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match &self.outcome {
            Outcome::Success(data) => Some(data),
            Outcome::Failure(_) => None,
        }
    }

    /// Returns the failure description of a failed request.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Returns the outcome.
    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Consumes the result, returning its outcome.
    #[must_use]
    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }
}

impl Serialize for DispatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DispatchResult", 4)?;
        state.serialize_field("success", &self.is_success())?;
        state.serialize_field("url", &self.url)?;
        state.serialize_field("request_body", &self.request_body)?;
        match &self.outcome {
            Outcome::Success(data) => state.serialize_field("data", data)?,
            Outcome::Failure(error) => state.serialize_field("error", error)?,
        }
        state.end()
    }
}

/// Success and failure counts over a set of results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    succeeded: usize,
    failed: usize,
}

impl BatchStats {
    /// Counts outcomes in `results`.
    #[must_use]
    pub fn from_results(results: &[DispatchResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    /// Returns the number of successful requests.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Returns the number of failed requests.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Returns the total number of requests.
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}
