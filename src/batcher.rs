//! Batch entry points.
//!
//! A [`Batcher`] owns a [`BatchConfig`] and a [`Connector`]. Each call opens
//! one transport, dispatches the batch through a fresh [`Scheduler`] and
//! closes the transport when the last request finishes, whether the batch
//! completed, aborted or was dropped.
//!
//! ```no_run
//! use abatcher_core::{BatchConfig, BatchOptions, Batcher};
//!
//! # async fn example() -> Result<(), abatcher_core::BatchError> {
//! let batcher = Batcher::new(BatchConfig::default().with_max_concurrent(4))?;
//! let results = batcher
//!     .process_batch(
//!         ["https://httpbin.org/get", "https://httpbin.org/uuid"],
//!         &BatchOptions::default(),
//!     )
//!     .await?;
//! for result in &results {
//!     println!("{} -> {:?}", result.url(), result.data());
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::collector::collect_ordered;
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::request::{RequestItem, normalize_all};
use crate::result::DispatchResult;
use crate::scheduler::{Dispatches, Scheduler};
use crate::transport::{Connector, HttpConnector, Transport};

/// Per-call options for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOptions {
    /// Method for items that do not name one. Defaults to `GET`.
    pub method: Method,
    /// Overrides the configured per-request timeout for this batch only.
    pub timeout: Option<Duration>,
    /// Overrides the configured abort-on-failure setting for this batch only.
    pub raise_on_any_failure: Option<bool>,
}

impl BatchOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the timeout override.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the abort-on-failure override.
    #[must_use]
    pub fn with_raise_on_any_failure(mut self, raise: bool) -> Self {
        self.raise_on_any_failure = Some(raise);
        self
    }
}

/// Dispatches batches of HTTP requests under fixed limits.
#[derive(Debug, Clone)]
pub struct Batcher<C: Connector = HttpConnector> {
    config: BatchConfig,
    connector: C,
}

impl Batcher {
    /// Creates a batcher using the HTTP connector.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::TransportInit`] if `config` is invalid.
    pub fn new(config: BatchConfig) -> Result<Self, BatchError> {
        Self::with_connector(config, HttpConnector)
    }
}

impl<C: Connector> Batcher<C> {
    /// Creates a batcher that opens transports through `connector`.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::TransportInit`] if `config` is invalid.
    pub fn with_connector(config: BatchConfig, connector: C) -> Result<Self, BatchError> {
        config.validate()?;
        debug!(?config, "batcher configured");
        Ok(Self { config, connector })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Returns the connector.
    #[must_use]
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Prepares a batch and returns its results as they complete.
    ///
    /// Every item is validated before the transport is opened, so a malformed
    /// item means nothing is sent. An empty batch opens no transport. The
    /// returned stream yields `(index, result)` pairs in completion order;
    /// dropping it cancels whatever is still in flight.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Validation`] for a malformed item and
    /// [`BatchError::TransportInit`] if the transport cannot be opened.
    pub fn stream<I>(&self, items: I, options: &BatchOptions) -> Result<Dispatches, BatchError>
    where
        I: IntoIterator,
        I::Item: Into<RequestItem>,
    {
        let descriptors = normalize_all(items.into_iter().map(Into::into), &options.method)?;
        if descriptors.is_empty() {
            debug!("empty batch, nothing to dispatch");
            return Ok(Dispatches::empty());
        }

        let settings = self.config.transport_settings(options.timeout)?;
        let transport = Arc::new(self.connector.open(&settings)?);
        let requests = descriptors
            .iter()
            .map(|descriptor| transport.build_request(descriptor))
            .collect();
        Ok(self.scheduler().run(transport, requests))
    }

    /// Dispatches a batch and returns one result per item, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Validation`] or [`BatchError::TransportInit`] as
    /// [`stream`](Self::stream) does, and [`BatchError::Aborted`] on the first
    /// failed request when abort-on-failure is in effect.
    #[instrument(skip(self, items, options), fields(method = %options.method))]
    pub async fn process_batch<I>(
        &self,
        items: I,
        options: &BatchOptions,
    ) -> Result<Vec<DispatchResult>, BatchError>
    where
        I: IntoIterator,
        I::Item: Into<RequestItem>,
    {
        let dispatches = self.stream(items, options)?;
        let raise = options
            .raise_on_any_failure
            .unwrap_or(self.config.raise_on_any_failure);
        let expected = dispatches.total();
        info!(count = expected, raise_on_any_failure = raise, "processing batch");
        collect_ordered(dispatches, expected, raise).await
    }

    /// Sends a single `GET` request.
    ///
    /// # Errors
    ///
    /// See [`process_batch`](Self::process_batch).
    pub async fn get(&self, url: &str) -> Result<DispatchResult, BatchError> {
        self.send(url, &BatchOptions::default()).await
    }

    /// Sends a single `POST` request with an optional JSON body.
    ///
    /// # Errors
    ///
    /// See [`process_batch`](Self::process_batch).
    pub async fn post(&self, url: &str, body: Option<Value>) -> Result<DispatchResult, BatchError> {
        let options = BatchOptions::default().with_method(Method::POST);
        let item = RequestItem::Pair(url.to_string(), body.unwrap_or(Value::Null));
        self.send(item, &options).await
    }

    /// Sends a single item as a batch of one.
    ///
    /// # Errors
    ///
    /// See [`process_batch`](Self::process_batch).
    pub async fn send(
        &self,
        item: impl Into<RequestItem>,
        options: &BatchOptions,
    ) -> Result<DispatchResult, BatchError> {
        self.process_batch([item.into()], options)
            .await?
            .pop()
            .ok_or(BatchError::Incomplete {
                expected: 1,
                received: 0,
            })
    }

    fn scheduler(&self) -> Scheduler {
        self.config.scheduler()
    }
}

/// Dispatches `items` with the default configuration and options.
///
/// # Errors
///
/// See [`Batcher::process_batch`].
pub async fn run<I>(items: I) -> Result<Vec<DispatchResult>, BatchError>
where
    I: IntoIterator,
    I::Item: Into<RequestItem>,
{
    Batcher::new(BatchConfig::default())?
        .process_batch(items, &BatchOptions::default())
        .await
}
