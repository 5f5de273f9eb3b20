//! Bounded fan-out: concurrent processing of a capped front slice.
//!
//! Spec'd for small collections (web search results); anything past the cap
//! is dropped, not queued. Results come back in input order and the whole
//! batch fails fast on the first error.

use std::future::Future;

use futures::future::try_join_all;
use tracing::debug;

use lattice_core::Result;

/// Run `task` concurrently over at most the first `limit` items.
///
/// Items beyond the cap are discarded. The returned vector is in the same
/// order as the input slice regardless of completion order; the first task
/// error aborts the batch.
pub async fn run_bounded<T, R, F, Fut>(items: Vec<T>, limit: usize, task: F) -> Result<Vec<R>>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let total = items.len();
    let selected: Vec<T> = items.into_iter().take(limit).collect();
    if selected.len() < total {
        debug!(
            item_count = selected.len(),
            dropped = total - selected.len(),
            "Fan-out capped"
        );
    }

    try_join_all(selected.into_iter().map(task)).await
}
