//! Synchronous front end for callers without an async runtime.
//!
//! [`BlockingBatcher`] owns a current-thread tokio runtime and drives an
//! async [`Batcher`] to completion on the calling thread.
//!
//! # Panics
//!
//! Every method blocks on the owned runtime and panics if called from inside
//! an async context. Use [`Batcher`] there instead.

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};

use crate::batcher::{BatchOptions, Batcher};
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::request::RequestItem;
use crate::result::DispatchResult;
use crate::transport::{Connector, HttpConnector};

/// Blocking wrapper around [`Batcher`].
#[derive(Debug)]
pub struct BlockingBatcher<C: Connector = HttpConnector> {
    runtime: Runtime,
    inner: Batcher<C>,
}

impl BlockingBatcher {
    /// Creates a blocking batcher using the HTTP connector.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::TransportInit`] if `config` is invalid and
    /// [`BatchError::Runtime`] if the runtime cannot be built.
    pub fn new(config: BatchConfig) -> Result<Self, BatchError> {
        let batcher = Batcher::new(config)?;
        Ok(Self::with_runtime(batcher, current_thread_runtime()?))
    }
}

impl<C: Connector> BlockingBatcher<C> {
    /// Wraps an existing batcher, driving it on `runtime`.
    #[must_use]
    pub fn with_runtime(inner: Batcher<C>, runtime: Runtime) -> Self {
        Self { runtime, inner }
    }

    /// Returns the wrapped async batcher.
    #[must_use]
    pub fn batcher(&self) -> &Batcher<C> {
        &self.inner
    }

    /// Blocking form of [`Batcher::process_batch`].
    ///
    /// # Errors
    ///
    /// See [`Batcher::process_batch`].
    pub fn process_batch<I>(
        &self,
        items: I,
        options: &BatchOptions,
    ) -> Result<Vec<DispatchResult>, BatchError>
    where
        I: IntoIterator,
        I::Item: Into<RequestItem>,
    {
        self.runtime
            .block_on(self.inner.process_batch(items, options))
    }

    /// Blocking form of [`Batcher::get`].
    ///
    /// # Errors
    ///
    /// See [`Batcher::process_batch`].
    pub fn get(&self, url: &str) -> Result<DispatchResult, BatchError> {
        self.runtime.block_on(self.inner.get(url))
    }

    /// Blocking form of [`Batcher::post`].
    ///
    /// # Errors
    ///
    /// See [`Batcher::process_batch`].
    pub fn post(&self, url: &str, body: Option<Value>) -> Result<DispatchResult, BatchError> {
        self.runtime.block_on(self.inner.post(url, body))
    }

    /// Blocking form of [`Batcher::send`].
    ///
    /// # Errors
    ///
    /// See [`Batcher::process_batch`].
    pub fn send(
        &self,
        item: impl Into<RequestItem>,
        options: &BatchOptions,
    ) -> Result<DispatchResult, BatchError> {
        self.runtime.block_on(self.inner.send(item, options))
    }
}

/// Blocking form of [`crate::run`].
///
/// # Errors
///
/// See [`Batcher::process_batch`].
pub fn run<I>(items: I) -> Result<Vec<DispatchResult>, BatchError>
where
    I: IntoIterator,
    I::Item: Into<RequestItem>,
{
    BlockingBatcher::new(BatchConfig::default())?.process_batch(items, &BatchOptions::default())
}

fn current_thread_runtime() -> Result<Runtime, BatchError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(BatchError::Runtime)
}
