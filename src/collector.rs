//! Reassembles completion-ordered dispatches into input order.

use futures_util::{Stream, StreamExt};
use tracing::{info, warn};

use crate::error::BatchError;
use crate::result::{BatchStats, DispatchResult};

/// Drains `(index, result)` pairs for a batch of `expected` requests into a
/// list aligned with the original input.
///
/// With `raise_on_any_failure`, the first failed result ends collection.
/// The stream is dropped on return, which cancels requests still in flight.
/// Indices outside `0..expected` are ignored.
///
/// # Errors
///
/// Returns [`BatchError::Aborted`] on the first failure when
/// `raise_on_any_failure` is set, and [`BatchError::Incomplete`] if the
/// stream ends before every index has reported.
pub async fn collect_ordered<S>(
    mut dispatches: S,
    expected: usize,
    raise_on_any_failure: bool,
) -> Result<Vec<DispatchResult>, BatchError>
where
    S: Stream<Item = (usize, DispatchResult)> + Unpin,
{
    let mut slots: Vec<Option<DispatchResult>> = (0..expected).map(|_| None).collect();

    while let Some((index, result)) = dispatches.next().await {
        if raise_on_any_failure && let Some(error) = result.error() {
            warn!(index, url = result.url(), "aborting batch on failed request");
            return Err(BatchError::Aborted {
                index,
                url: result.url().to_string(),
                error: error.to_string(),
            });
        }
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(result);
        }
    }

    let received = slots.iter().filter(|slot| slot.is_some()).count();
    let results = slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(BatchError::Incomplete { expected, received })?;

    let stats = BatchStats::from_results(&results);
    info!(
        total = stats.total(),
        succeeded = stats.succeeded(),
        failed = stats.failed(),
        "batch complete"
    );
    Ok(results)
}
