//! Request item normalization.
//!
//! Callers hand the batcher loosely shaped items: a bare URL, a `(url, params)`
//! pair, or a JSON record with a `url` key plus optional `method`, `params` (or
//! `body`) and `headers`. This module turns each of them into a
//! [`RequestDescriptor`], the canonical request the scheduler works with.
//!
//! Normalization is pure: it never touches the network.
//!
//! # Example
//!
//! ```
//! use abatcher_core::request::{RequestItem, normalize};
//! use reqwest::Method;
//! use serde_json::json;
//!
//! let item: RequestItem = serde_json::from_value(json!({
//!     "url": "https://example.com/post",
//!     "method": "POST",
//!     "params": {"name": "Test"},
//! }))
//! .unwrap();
//!
//! let descriptor = normalize(0, item, &Method::GET).unwrap();
//! assert_eq!(descriptor.method, Method::POST);
//! assert_eq!(descriptor.body, Some(json!({"name": "Test"})));
//! ```

mod error;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

pub use error::ValidationError;

/// HTTP verbs accepted in request items.
pub const STANDARD_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
    Method::TRACE,
    Method::CONNECT,
];

/// One raw input item, in any of the accepted shapes.
///
/// Deserializes from JSON as a string, a two-element array, or an object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RequestItem {
    /// A bare URL, sent with the batch's default method.
    Url(String),
    /// A URL plus a JSON payload, sent as the request body.
    Pair(String, Value),
    /// A record with at least a `url` key.
    Record(Map<String, Value>),
}

impl RequestItem {
    /// Creates a record item for an explicit method, body and headers.
    #[must_use]
    pub fn record(
        url: impl Into<String>,
        method: &Method,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Self {
        let mut record = Map::new();
        record.insert("url".to_string(), Value::String(url.into()));
        record.insert(
            "method".to_string(),
            Value::String(method.as_str().to_string()),
        );
        if let Some(body) = body {
            record.insert("params".to_string(), body);
        }
        if !headers.is_empty() {
            let headers = headers
                .iter()
                .map(|(name, value)| ((*name).to_string(), Value::String((*value).to_string())))
                .collect();
            record.insert("headers".to_string(), Value::Object(headers));
        }
        Self::Record(record)
    }
}

impl From<&str> for RequestItem {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for RequestItem {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl<S: Into<String>> From<(S, Value)> for RequestItem {
    fn from((url, params): (S, Value)) -> Self {
        Self::Pair(url.into(), params)
    }
}

impl From<Map<String, Value>> for RequestItem {
    fn from(record: Map<String, Value>) -> Self {
        Self::Record(record)
    }
}

/// Canonical form of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// Target URL, absolute or relative to the configured base URL. Never empty.
    pub url: String,
    /// HTTP method, always one of [`STANDARD_METHODS`].
    pub method: Method,
    /// JSON payload sent as the request body.
    pub body: Option<Value>,
    /// Extra request headers.
    pub headers: HeaderMap,
}

impl RequestDescriptor {
    /// Creates a descriptor with no body and no extra headers.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            body: None,
            headers: HeaderMap::new(),
        }
    }
}

/// Normalizes one item at position `index` of a batch.
///
/// Bare URLs and pairs use `default_method`; records use their own `method`
/// when present and fall back to `default_method` otherwise.
///
/// # Errors
///
/// Returns [`ValidationError`] when a record lacks `url`, the URL is empty,
/// a field has the wrong type, the method is not a standard verb, or a header
/// cannot be encoded.
pub fn normalize(
    index: usize,
    item: RequestItem,
    default_method: &Method,
) -> Result<RequestDescriptor, ValidationError> {
    match item {
        RequestItem::Url(url) => {
            let url = require_url(index, url)?;
            Ok(RequestDescriptor::new(default_method.clone(), url))
        }
        RequestItem::Pair(url, params) => {
            let url = require_url(index, url)?;
            let mut descriptor = RequestDescriptor::new(default_method.clone(), url);
            descriptor.body = non_null(params);
            Ok(descriptor)
        }
        RequestItem::Record(record) => normalize_record(index, record, default_method),
    }
}

/// Normalizes every item of a batch, stopping at the first invalid one.
///
/// # Errors
///
/// Returns the [`ValidationError`] of the first malformed item.
#[instrument(level = "debug", skip(items))]
pub fn normalize_all<I>(
    items: I,
    default_method: &Method,
) -> Result<Vec<RequestDescriptor>, ValidationError>
where
    I: IntoIterator<Item = RequestItem>,
{
    let descriptors = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| normalize(index, item, default_method))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(count = descriptors.len(), "normalized request items");
    Ok(descriptors)
}

fn normalize_record(
    index: usize,
    mut record: Map<String, Value>,
    default_method: &Method,
) -> Result<RequestDescriptor, ValidationError> {
    let url = match record.remove("url") {
        None | Some(Value::Null) => return Err(ValidationError::MissingUrl { index }),
        Some(Value::String(url)) => require_url(index, url)?,
        Some(_) => {
            return Err(ValidationError::InvalidField {
                index,
                field: "url",
                expected: "a string",
            });
        }
    };

    let method = match record.remove("method") {
        None | Some(Value::Null) => default_method.clone(),
        Some(Value::String(method)) => parse_method(index, &method)?,
        Some(_) => {
            return Err(ValidationError::InvalidField {
                index,
                field: "method",
                expected: "a string",
            });
        }
    };

    let body = record
        .remove("params")
        .and_then(non_null)
        .or_else(|| record.remove("body").and_then(non_null));

    let headers = match record.remove("headers") {
        None | Some(Value::Null) => HeaderMap::new(),
        Some(Value::Object(headers)) => parse_headers(index, headers)?,
        Some(_) => {
            return Err(ValidationError::InvalidField {
                index,
                field: "headers",
                expected: "an object of strings",
            });
        }
    };

    Ok(RequestDescriptor {
        url,
        method,
        body,
        headers,
    })
}

fn require_url(index: usize, url: String) -> Result<String, ValidationError> {
    if url.trim().is_empty() {
        return Err(ValidationError::EmptyUrl { index });
    }
    Ok(url)
}

fn non_null(value: Value) -> Option<Value> {
    if value.is_null() { None } else { Some(value) }
}

fn parse_method(index: usize, method: &str) -> Result<Method, ValidationError> {
    let upper = method.trim().to_ascii_uppercase();
    STANDARD_METHODS
        .iter()
        .find(|candidate| candidate.as_str() == upper)
        .cloned()
        .ok_or_else(|| ValidationError::UnsupportedMethod {
            index,
            method: method.to_string(),
        })
}

fn parse_headers(index: usize, headers: Map<String, Value>) -> Result<HeaderMap, ValidationError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let Value::String(value) = value else {
            return Err(ValidationError::InvalidHeader {
                index,
                name,
                reason: "value must be a string".to_string(),
            });
        };
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ValidationError::InvalidHeader {
                index,
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(&value).map_err(|e| ValidationError::InvalidHeader {
                index,
                name: name.clone(),
                reason: e.to_string(),
            })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
