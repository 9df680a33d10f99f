//! Per-item fan-out with failure isolation.
//!
//! Every item's call is created up front and joined in the calling task, so
//! item futures need not be `Send`. A failed, timed-out or panicking call is
//! replaced by the stage's fallback for that item alone.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use covenant_core::StageConfig;
use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::warn;

/// Why an item's call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemFailure {
    Failed(String),
    TimedOut(Duration),
    Panicked,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(msg) => write!(f, "failed: {msg}"),
            Self::TimedOut(after) => write!(f, "timed out after {after:?}"),
            Self::Panicked => f.write_str("panicked"),
        }
    }
}

/// Order-preserving stage output.
#[derive(Debug, Clone, PartialEq)]
pub struct StageOutput<U> {
    pub items: Vec<U>,
    /// How many entries of `items` are fallback values.
    pub fallbacks: usize,
}

pub struct StageExecutor {
    stage: &'static str,
    limit: Option<Semaphore>,
    item_timeout: Duration,
}

impl StageExecutor {
    /// `stage` names the stage in log records.
    pub fn new(stage: &'static str, config: &StageConfig) -> Self {
        Self {
            stage,
            limit: config
                .concurrency_limit()
                .map(|n| Semaphore::new(n.min(Semaphore::MAX_PERMITS))),
            item_timeout: config.item_timeout(),
        }
    }

    /// Apply `op` to every item concurrently.
    ///
    /// The output has one entry per input, in input order. Items whose call
    /// fails get `fallback(item, failure)` instead; other items are
    /// unaffected.
    pub async fn run<'a, T, U, E, Op, Fut, Fb>(
        &self,
        items: &'a [T],
        op: Op,
        fallback: Fb,
    ) -> StageOutput<U>
    where
        Op: Fn(&'a T) -> Fut,
        Fut: Future<Output = Result<U, E>>,
        E: fmt::Display,
        Fb: Fn(&T, &ItemFailure) -> U,
    {
        let op = &op;
        let limit = self.limit.as_ref();
        let item_timeout = self.item_timeout;

        let calls = items.iter().map(|item| {
            let call = async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = match limit {
                    Some(semaphore) => semaphore.acquire().await.ok(),
                    None => None,
                };
                tokio::time::timeout(item_timeout, op(item)).await
            };
            AssertUnwindSafe(call).catch_unwind()
        });
        let outcomes = join_all(calls).await;

        let mut fallbacks = 0;
        let results: Vec<U> = items
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (item, outcome))| {
                let failure = match outcome {
                    Ok(Ok(Ok(value))) => return value,
                    Ok(Ok(Err(e))) => ItemFailure::Failed(e.to_string()),
                    Ok(Err(_elapsed)) => ItemFailure::TimedOut(item_timeout),
                    Err(_panic) => ItemFailure::Panicked,
                };
                warn!(stage = self.stage, index, error = %failure, "item failed; using fallback");
                fallbacks += 1;
                fallback(item, &failure)
            })
            .collect();

        StageOutput {
            items: results,
            fallbacks,
        }
    }
}
