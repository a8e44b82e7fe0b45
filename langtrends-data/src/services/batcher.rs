//! Bounded concurrent fan-out with a join barrier per batch
//!
//! At most `limit` futures are in flight; a batch fully settles (success or
//! failure) before the caller can start the next one.

use futures::future::join_all;
use std::future::Future;

#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyBatcher {
    limit: usize,
}

impl ConcurrencyBatcher {
    /// A limit of 0 is treated as 1
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Split work into batches of at most `limit` items
    pub fn batches<'a, T>(&self, items: &'a [T]) -> std::slice::Chunks<'a, T> {
        items.chunks(self.limit)
    }

    /// Drive one batch to completion, returning outputs in input order
    pub async fn settle<I, F>(&self, batch: I) -> Vec<F::Output>
    where
        I: IntoIterator<Item = F>,
        F: Future,
    {
        let futures: Vec<F> = batch.into_iter().collect();
        debug_assert!(futures.len() <= self.limit);
        join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_batches_respect_limit() {
        let batcher = ConcurrencyBatcher::new(2);
        let items = [1, 2, 3, 4, 5];
        let sizes: Vec<usize> = batcher.batches(&items).map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_zero_limit_becomes_one() {
        assert_eq!(ConcurrencyBatcher::new(0).limit(), 1);
    }

    #[tokio::test]
    async fn test_settle_preserves_order() {
        let batcher = ConcurrencyBatcher::new(3);
        let outputs = batcher
            .settle([30u64, 10, 20].into_iter().map(|ms| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                ms
            }))
            .await;
        assert_eq!(outputs, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_limit() {
        let batcher = ConcurrencyBatcher::new(3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<u64> = (0..10).collect();

        for batch in batcher.batches(&items) {
            batcher
                .settle(batch.iter().map(|_| {
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    }
                }))
                .await;
            // Barrier: nothing from this batch is still running
            assert_eq!(in_flight.load(Ordering::SeqCst), 0);
        }

        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }
}
