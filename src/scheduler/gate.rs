//! Concurrency gate bounding how many dispatches are in flight.

use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// The gate's semaphore was closed while a dispatch waited for admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("admission gate closed before the request could start")]
pub struct GateClosed;

/// Admission gate allowing at most `limit` holders of a [`GatePermit`] at once.
///
/// Waiters are admitted in FIFO order. Cloning a gate shares its permits.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Option<Arc<Semaphore>>,
}

/// Proof of admission; dropping it frees the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: Option<OwnedSemaphorePermit>,
}

impl ConcurrencyGate {
    /// Creates a gate admitting at most `limit` concurrent holders.
    ///
    /// `None` creates an unbounded gate that admits immediately.
    #[must_use]
    pub fn new(limit: Option<NonZeroUsize>) -> Self {
        Self {
            semaphore: limit
                .map(|limit| Arc::new(Semaphore::new(limit.get().min(Semaphore::MAX_PERMITS)))),
        }
    }

    /// Creates a gate that never blocks.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// Returns the number of slots currently free, or `None` when unbounded.
    #[must_use]
    pub fn available(&self) -> Option<usize> {
        self.semaphore.as_ref().map(|s| s.available_permits())
    }

    /// Waits for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`GateClosed`] if the underlying semaphore has been closed.
    pub async fn acquire(&self) -> Result<GatePermit, GateClosed> {
        let Some(semaphore) = &self.semaphore else {
            return Ok(GatePermit { _permit: None });
        };
        let permit = Arc::clone(semaphore)
            .acquire_owned()
            .await
            .map_err(|_| GateClosed)?;
        Ok(GatePermit {
            _permit: Some(permit),
        })
    }
}
