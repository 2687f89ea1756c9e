//! Concurrency-bounded batch dispatch with fixed-delay retry and inter-group
//! pacing.
//!
//! Batches are dispatched in groups of up to the concurrency cap; each
//! in-flight call holds a semaphore permit for its duration. After a group
//! resolves, the group sink runs (the stage runner persists there), and if
//! more batches remain the invoker sleeps for the configured pacing delay
//! before dispatching the next group. Pacing throttles aggregate request rate
//! independently of the concurrency cap.

use crate::error::{ModelError, Result};
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Fixed-delay retry: up to `max_attempts` tries with `delay` between them
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// Run `attempt` until it succeeds or the attempt ceiling is reached; the
/// last error propagates.
pub async fn retry_fixed<T, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let ceiling = policy.max_attempts.max(1);
    let mut tries = 0u32;
    loop {
        tries += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if tries < ceiling => {
                warn!(
                    "attempt {tries}/{ceiling} failed, retrying in {:?}: {err}",
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Result of one batch invocation, tagged with the batch's position in the
/// original dispatch order
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub index: usize,
    pub result: Result<Vec<T>>,
}

/// Drives batch operations against a remote model under a concurrency cap
pub struct BoundedInvoker {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry: RetryPolicy,
    pacing: Duration,
}

impl BoundedInvoker {
    pub fn new(concurrency: usize, retry: RetryPolicy, pacing: Duration) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry,
            pacing,
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Dispatch every batch through `op`, invoking `on_group` once per
    /// resolved dispatch group. An empty batch list returns immediately
    /// without calling the model or sleeping.
    pub async fn run_batches<I, T, F, Fut, S, E>(
        &self,
        batches: Vec<Vec<I>>,
        op: F,
        mut on_group: S,
    ) -> std::result::Result<(), E>
    where
        I: Clone,
        F: Fn(Vec<I>) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
        S: FnMut(Vec<BatchOutcome<T>>) -> std::result::Result<(), E>,
    {
        if batches.is_empty() {
            return Ok(());
        }

        let total = batches.len();
        let op = &op;
        let mut iter = batches.into_iter().enumerate();
        let mut dispatched = 0usize;

        while dispatched < total {
            let group: Vec<(usize, Vec<I>)> = iter.by_ref().take(self.concurrency).collect();
            dispatched += group.len();

            let in_flight = group.into_iter().map(|(index, batch)| async move {
                let batch_ref = &batch;
                let result = retry_fixed(&self.retry, move || {
                    let batch = batch_ref.clone();
                    async move {
                        let _permit = self
                            .semaphore
                            .acquire()
                            .await
                            .map_err(|_| ModelError::GateClosed)?;
                        op(batch).await
                    }
                })
                .await;
                BatchOutcome { index, result }
            });

            let outcomes = join_all(in_flight).await;
            on_group(outcomes)?;

            if dispatched < total && !self.pacing.is_zero() {
                debug!("pacing {:?} before next dispatch group", self.pacing);
                tokio::time::sleep(self.pacing).await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn invoker(concurrency: usize, pacing_secs: u64) -> BoundedInvoker {
        BoundedInvoker::new(
            concurrency,
            RetryPolicy::default(),
            Duration::from_secs(pacing_secs),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batches_return_immediately() {
        let calls = AtomicUsize::new(0);
        let started = Instant::now();

        invoker(2, 30)
            .run_batches(
                Vec::<Vec<u32>>::new(),
                |_batch| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(vec![0u32]) }
                },
                |_| Ok::<(), Infallible>(()),
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_sleeps_exactly_once_between_two_groups() {
        let started = Instant::now();

        invoker(1, 10)
            .run_batches(
                vec![vec![1u32], vec![2u32]],
                |batch| async move { Ok(batch) },
                |_| Ok::<(), Infallible>(()),
            )
            .await
            .unwrap();

        // One sleep between the two groups, none before the first or after
        // the last.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(10), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(20), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let started = Instant::now();

        let mut groups = 0usize;
        invoker(1, 0)
            .run_batches(
                vec![vec![7u32]],
                |batch| {
                    let attempt = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt < 2 {
                            Err(ModelError::Api {
                                status: 429,
                                message: "rate limited".to_string(),
                            })
                        } else {
                            Ok(batch)
                        }
                    }
                },
                |outcomes| {
                    groups += 1;
                    assert!(outcomes[0].result.is_ok());
                    Ok::<(), Infallible>(())
                },
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(groups, 1);
        // Two inter-attempt delays of the default 3s.
        assert!(started.elapsed() >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_yields_last_error() {
        let calls = AtomicUsize::new(0);

        let mut failed = 0usize;
        invoker(1, 0)
            .run_batches(
                vec![vec![1u32]],
                |_batch| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async {
                        Err::<Vec<u32>, _>(ModelError::Api {
                            status: 500,
                            message: "boom".to_string(),
                        })
                    }
                },
                |outcomes| {
                    for outcome in &outcomes {
                        if outcome.result.is_err() {
                            failed += 1;
                        }
                    }
                    Ok::<(), Infallible>(())
                },
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_bounds_in_flight_calls() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let high_water = Arc::new(AtomicUsize::new(0));

        let batches: Vec<Vec<u32>> = (0..6).map(|n| vec![n]).collect();
        let in_flight_op = in_flight.clone();
        let high_water_op = high_water.clone();

        invoker(2, 0)
            .run_batches(
                batches,
                move |batch| {
                    let in_flight = in_flight_op.clone();
                    let high_water = high_water_op.clone();
                    async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        high_water.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(batch)
                    }
                },
                |_| Ok::<(), Infallible>(()),
            )
            .await
            .unwrap();

        assert!(high_water.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outcomes_keep_dispatch_indices() {
        let mut seen = Vec::new();

        invoker(2, 0)
            .run_batches(
                vec![vec![10u32], vec![20u32], vec![30u32]],
                |batch| async move { Ok(batch) },
                |outcomes| {
                    for outcome in outcomes {
                        seen.push((outcome.index, outcome.result.unwrap()));
                    }
                    Ok::<(), Infallible>(())
                },
            )
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![(0, vec![10]), (1, vec![20]), (2, vec![30])]
        );
    }
}
