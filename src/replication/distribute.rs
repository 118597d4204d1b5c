//! Fan chunks of source records out over a bounded pool of workers.
//!
//! Workers share only read-only inputs and return their own outcome, so no
//! locking is involved. A failed chunk does not stop its siblings.

use crate::error::Result;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::ops::Range;

/// Result of running the work function on one chunk.
#[derive(Debug)]
pub struct ChunkOutcome<T> {
    pub index: usize,
    /// Position of the chunk in the input list.
    pub range: Range<usize>,
    pub result: Result<T>,
}

/// Contiguous ranges of at most `batch_size` items covering `0..len`.
pub fn chunk_ranges(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = batch_size.max(1);
    (0..len)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(len))
        .collect()
}

/// Run `work` over `items` in chunks of `batch_size`, at most `num_workers`
/// chunks in flight at once.
///
/// Inputs no larger than one batch run inline as a single chunk. Outcomes
/// come back ordered by chunk index regardless of completion order.
pub async fn distribute<'a, T, O, F, Fut>(
    num_workers: usize,
    items: &'a [T],
    batch_size: usize,
    work: F,
) -> Vec<ChunkOutcome<O>>
where
    F: Fn(usize, &'a [T]) -> Fut,
    Fut: Future<Output = Result<O>>,
{
    if items.len() <= batch_size {
        return vec![ChunkOutcome {
            index: 0,
            range: 0..items.len(),
            result: work(0, items).await,
        }];
    }

    let ranges = chunk_ranges(items.len(), batch_size);
    tracing::debug!(
        chunks = ranges.len(),
        workers = num_workers,
        "Distributing work over worker pool"
    );

    let mut outcomes: Vec<ChunkOutcome<O>> = stream::iter(ranges.into_iter().enumerate())
        .map(|(index, range)| {
            let pending = work(index, &items[range.clone()]);
            async move {
                ChunkOutcome {
                    index,
                    range,
                    result: pending.await,
                }
            }
        })
        .buffer_unordered(num_workers.max(1))
        .collect()
        .await;

    outcomes.sort_by_key(|outcome| outcome.index);
    outcomes
}
