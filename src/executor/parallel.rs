//! Parallel test dispatch
//!
//! Fans the selected units of one job out over the shared worker pool and
//! waits for every one of them.

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{error, info};

use super::{RetryingExecutor, WorkerPool};
use crate::models::UnitResult;
use crate::suite::{ExecutionContext, TestUnit};

/// Bounded-concurrency dispatcher
#[derive(Clone)]
pub struct ParallelDispatcher {
    pool: Arc<WorkerPool>,
    executor: Arc<RetryingExecutor>,
}

impl ParallelDispatcher {
    pub fn new(pool: Arc<WorkerPool>, executor: Arc<RetryingExecutor>) -> Self {
        Self { pool, executor }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Run every unit and return one result per unit, in completion order.
    ///
    /// A task that cannot deliver its result (it panicked outside the unit,
    /// or the pool is gone) is reported as a failed result for that unit so
    /// the rest of the job still aggregates.
    pub async fn dispatch(
        &self,
        ctx: &ExecutionContext,
        units: Vec<Arc<dyn TestUnit>>,
    ) -> Vec<UnitResult> {
        let total = units.len();
        let pending = FuturesUnordered::new();

        for unit in units {
            let name = unit.info().name.clone();
            let executor = self.executor.clone();
            let task_ctx = ctx.clone();

            let submitted = self
                .pool
                .submit(async move { executor.run(unit.as_ref(), &task_ctx).await })
                .await;

            pending.push(async move {
                let outcome = match submitted {
                    Ok(handle) => handle.join().await,
                    Err(e) => Err(e),
                };
                (name, outcome)
            });
        }

        info!(
            "Submitted {} tests to the worker pool for run {}",
            total, ctx.run_id
        );

        pending
            .map(|(name, outcome)| match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!("Could not retrieve result of '{}': {}", name, e);
                    UnitResult::synthetic_failure(
                        name,
                        format!("[Test Execution Error]: Failed to retrieve result from worker: {e}"),
                    )
                }
            })
            .collect()
            .await
    }
}
