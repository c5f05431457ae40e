use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use rand::Rng;

use crate::config::BroadcastConfig;
use crate::error::ValidationError;

/// Randomized pause a worker takes after finishing an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    min: Duration,
    max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Result<Self, ValidationError> {
        if min > max {
            return Err(ValidationError::InvalidDelay {
                min_ms: min.as_millis() as u64,
                max_ms: max.as_millis() as u64,
            });
        }
        Ok(Self { min, max })
    }

    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn from_config(config: &BroadcastConfig) -> Result<Self, ValidationError> {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Uniform draw from `[min, max]`.
    pub fn next_pause(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        let millis = rand::thread_rng()
            .gen_range(self.min.as_millis() as u64..=self.max.as_millis() as u64);
        Duration::from_millis(millis)
    }
}

/// Runs one async job per item with at most `limit` jobs in flight. A slot is
/// released only after the job and its pacing pause have both finished. No
/// pause is taken once every item has been handed out.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    limit: NonZeroUsize,
    pacing: Pacing,
}

impl WorkerPool {
    pub fn new(limit: NonZeroUsize, pacing: Pacing) -> Self {
        Self { limit, pacing }
    }

    pub fn from_config(config: &BroadcastConfig) -> Result<Self, ValidationError> {
        Ok(Self::new(
            Self::limit_from_config(config)?,
            Pacing::from_config(config)?,
        ))
    }

    pub fn limit_from_config(config: &BroadcastConfig) -> Result<NonZeroUsize, ValidationError> {
        NonZeroUsize::new(config.concurrency).ok_or(ValidationError::InvalidConcurrency)
    }

    pub fn limit(&self) -> usize {
        self.limit.get()
    }

    /// Items are started in iteration order; completion order is unspecified.
    pub async fn run<I, F, Fut>(&self, items: I, job: F)
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = ()>,
    {
        let items: Vec<I::Item> = items.into_iter().collect();
        let total = items.len();
        let started = AtomicUsize::new(0);
        let (pacing, started) = (self.pacing, &started);

        stream::iter(items)
            .for_each_concurrent(self.limit.get(), |item| {
                started.fetch_add(1, Ordering::SeqCst);
                let work = job(item);
                async move {
                    work.await;
                    if started.load(Ordering::SeqCst) == total {
                        return;
                    }
                    let pause = pacing.next_pause();
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                }
            })
            .await;
    }
}
