//! Concurrency- and rate-limited dispatch of a batch.
//!
//! The [`Scheduler`] turns an ordered list of outbound requests into a stream
//! of `(index, DispatchResult)` pairs, yielded in completion order. Each
//! request starts only after it has been admitted by both composable gates:
//!
//! - [`ConcurrencyGate`] bounds how many requests are in flight. Its slot is
//!   held until the request completes.
//! - [`RateLimiter`] bounds how often requests start. Its spacing expires with
//!   time, never on completion.
//!
//! # Execution Model
//!
//! - Admission is sequential in input order, so both gates admit FIFO
//! - Admitted requests run concurrently inside the stream; no task is spawned,
//!   so everything runs on whichever task polls the stream
//! - Dropping the stream cancels every request still in flight
//!
//! # Example
//!
//! ```no_run
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//! use abatcher_core::request::RequestDescriptor;
//! use abatcher_core::scheduler::Scheduler;
//! use abatcher_core::transport::{Connector, HttpConnector, Transport, TransportSettings};
//! use futures_util::StreamExt;
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpConnector.open(&TransportSettings::default())?);
//! let requests = ["https://example.com/a", "https://example.com/b"]
//!     .iter()
//!     .map(|url| transport.build_request(&RequestDescriptor::new(Method::GET, *url)))
//!     .collect();
//!
//! let scheduler = Scheduler::new(NonZeroUsize::new(1), Some(5.0));
//! let mut dispatches = scheduler.run(transport, requests);
//! while let Some((index, result)) = dispatches.next().await {
//!     println!("{index}: {}", result.is_success());
//! }
//! # Ok(())
//! # }
//! ```

mod dispatch;
mod gate;
mod rate_limiter;

use std::fmt;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use tracing::{debug, instrument};

use crate::result::DispatchResult;
use crate::transport::{OutboundRequest, Transport};

pub use dispatch::{DispatchError, dispatch};
pub use gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use rate_limiter::RateLimiter;

/// Admission limits for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scheduler {
    max_concurrent: Option<NonZeroUsize>,
    max_per_second: Option<f64>,
}

impl Scheduler {
    /// Creates a scheduler with the given limits; `None` means unbounded.
    #[must_use]
    pub fn new(max_concurrent: Option<NonZeroUsize>, max_per_second: Option<f64>) -> Self {
        Self {
            max_concurrent,
            max_per_second,
        }
    }

    /// Creates a scheduler with no limits.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Returns the in-flight limit.
    #[must_use]
    pub fn max_concurrent(&self) -> Option<NonZeroUsize> {
        self.max_concurrent
    }

    /// Returns the start-rate limit.
    #[must_use]
    pub fn max_per_second(&self) -> Option<f64> {
        self.max_per_second
    }

    /// Dispatches `requests` through `transport` under this scheduler's limits.
    ///
    /// Nothing starts until the returned stream is polled. Every request
    /// yields exactly one item, tagged with its position in `requests`.
    /// Gate and limiter state is created fresh for each call.
    #[instrument(level = "debug", skip(self, transport, requests), fields(count = requests.len()))]
    pub fn run<T>(&self, transport: Arc<T>, requests: Vec<OutboundRequest>) -> Dispatches
    where
        T: Transport + ?Sized + 'static,
    {
        let total = requests.len();
        let gate = ConcurrencyGate::new(self.max_concurrent);
        let limiter = Arc::new(RateLimiter::from_rate(self.max_per_second));
        debug!(
            max_concurrent = ?self.max_concurrent,
            max_per_second = ?self.max_per_second,
            "scheduling dispatches"
        );

        let admitted = stream::iter(requests.into_iter().enumerate()).then(move |(index, request)| {
            let gate = gate.clone();
            let limiter = Arc::clone(&limiter);
            async move {
                let permit = gate.acquire().await;
                if permit.is_ok() {
                    limiter.acquire().await;
                }
                (index, request, permit)
            }
        });

        let inner = admitted
            .map(move |(index, request, permit)| {
                let transport = Arc::clone(&transport);
                async move {
                    let result = match permit {
                        Ok(_permit) => {
                            debug!(index, url = %request.url, "dispatch started");
                            dispatch(transport.as_ref(), &request).await
                        }
                        Err(closed) => DispatchResult::failure(
                            &request.url,
                            request.body.clone(),
                            closed.to_string(),
                        ),
                    };
                    (index, result)
                }
            })
            .buffer_unordered(usize::MAX)
            .boxed();

        Dispatches {
            inner,
            total,
            yielded: 0,
        }
    }
}

/// Lazy stream of `(index, result)` pairs in completion order.
///
/// Dropping it before exhaustion cancels outstanding requests.
pub struct Dispatches {
    inner: BoxStream<'static, (usize, DispatchResult)>,
    total: usize,
    yielded: usize,
}

impl Dispatches {
    /// A stream with nothing to dispatch.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inner: stream::empty().boxed(),
            total: 0,
            yielded: 0,
        }
    }

    /// Returns the number of requests in the batch.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Returns the number of results not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.total - self.yielded
    }
}

impl fmt::Debug for Dispatches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatches")
            .field("total", &self.total)
            .field("yielded", &self.yielded)
            .finish_non_exhaustive()
    }
}

impl Stream for Dispatches {
    type Item = (usize, DispatchResult);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let next = this.inner.poll_next_unpin(cx);
        if let Poll::Ready(Some(_)) = &next {
            this.yielded += 1;
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}
