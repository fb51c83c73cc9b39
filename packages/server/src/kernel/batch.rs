//! Chunked concurrent execution with a cooldown between chunks.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy)]
pub struct BatchRunner {
    chunk_size: usize,
    cooldown: Duration,
}

impl BatchRunner {
    /// A `chunk_size` of zero is treated as one.
    pub fn new(chunk_size: usize, cooldown: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            cooldown,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run `operation` over `items`, `chunk_size` at a time.
    ///
    /// Each chunk runs concurrently and is awaited in full before the next
    /// starts. Results come back in input order.
    pub async fn run<I, T, F, Fut>(&self, items: Vec<I>, mut operation: F) -> Vec<T>
    where
        F: FnMut(I) -> Fut,
        Fut: Future<Output = T>,
    {
        let mut results = Vec::with_capacity(items.len());
        let mut remaining = items.into_iter().peekable();
        let mut chunk_index = 0usize;

        while remaining.peek().is_some() {
            let chunk: Vec<Fut> = remaining
                .by_ref()
                .take(self.chunk_size)
                .map(&mut operation)
                .collect();

            tracing::trace!(chunk = chunk_index, size = chunk.len(), "Running batch chunk");
            results.extend(join_all(chunk).await);
            chunk_index += 1;

            if remaining.peek().is_some() && !self.cooldown.is_zero() {
                sleep(self.cooldown).await;
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn cooldown_only_between_chunks() {
        let runner = BatchRunner::new(2, Duration::from_millis(500));
        let start = Instant::now();

        let out = runner.run(vec![1, 2, 3, 4, 5], |n| async move { n * 10 }).await;

        assert_eq!(out, vec![10, 20, 30, 40, 50]);
        // Three chunks, two cooldowns.
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded_by_chunk_size() {
        let runner = BatchRunner::new(3, Duration::ZERO);
        let in_flight = &AtomicUsize::new(0);
        let peak = &AtomicUsize::new(0);

        runner
            .run((0..10).collect(), move |_: i32| async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn empty_input_returns_empty_output() {
        let runner = BatchRunner::new(4, Duration::from_secs(10));
        let out: Vec<i32> = runner.run(Vec::<i32>::new(), |n| async move { n }).await;
        assert!(out.is_empty());
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        assert_eq!(BatchRunner::new(0, Duration::ZERO).chunk_size(), 1);
    }

    proptest! {
        #[test]
        fn preserves_length_and_order(
            items in proptest::collection::vec(any::<u32>(), 0..60),
            chunk_size in 1usize..12,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            let runner = BatchRunner::new(chunk_size, Duration::from_millis(5));
            let out = runtime.block_on(runner.run(items.clone(), |n| async move {
                // Completion order within a chunk differs from input order.
                sleep(Duration::from_millis(u64::from(n % 7))).await;
                n
            }));

            prop_assert_eq!(out, items);
        }
    }
}
