//! Job runner
//!
//! Turns one [`Job`] into one [`JobResult`]: select units by tag, run the
//! selection through the dispatcher, aggregate.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::ParallelDispatcher;
use crate::models::{Job, JobResult, UnitResult};
use crate::results::aggregate;
use crate::suite::{ExecutionContext, Registry};

/// Runs jobs against a fixed registry of test units
#[derive(Clone)]
pub struct JobRunner {
    registry: Arc<Registry>,
    dispatcher: ParallelDispatcher,
    environments: HashMap<String, String>,
}

impl JobRunner {
    pub fn new(registry: Arc<Registry>, dispatcher: ParallelDispatcher) -> Self {
        Self {
            registry,
            dispatcher,
            environments: HashMap::new(),
        }
    }

    /// Environment name -> base URL units resolve relative targets against
    pub fn with_environments(mut self, environments: HashMap<String, String>) -> Self {
        self.environments.extend(environments);
        self
    }

    fn context_for(&self, job: &Job) -> ExecutionContext {
        let ctx = ExecutionContext::new(job.run_id.clone(), job.environment.clone());
        match self.environments.get(&job.environment) {
            Some(base_url) => ctx.with_base_url(base_url.clone()),
            None => {
                if !job.environment.is_empty() {
                    warn!(
                        "Environment '{}' has no configured base URL",
                        job.environment
                    );
                }
                ctx
            }
        }
    }

    /// Execute every unit selected by the job's tags.
    ///
    /// Never fails: a job whose tags match nothing yields a failed result
    /// without running anything.
    pub async fn run(&self, job: &Job) -> JobResult {
        self.run_with_results(job).await.0
    }

    /// Like [`run`](Self::run), also returning the unit results in
    /// completion order
    pub async fn run_with_results(&self, job: &Job) -> (JobResult, Vec<UnitResult>) {
        let units = self.registry.select(&job.tags);

        if units.is_empty() {
            warn!("No tests found for tags [{}] in {}", job.tags_display(), job.run_id);
            return (JobResult::no_matching_units(&job.tags_display()), Vec::new());
        }

        info!(
            "Running {} tests for {} with {} workers",
            units.len(),
            job,
            self.dispatcher.pool().size()
        );

        let start = Instant::now();
        let ctx = self.context_for(job);
        let results = self.dispatcher.dispatch(&ctx, units).await;
        let job_result = aggregate(&results);

        info!(
            "Run {} completed in {}ms: {}",
            job.run_id,
            start.elapsed().as_millis(),
            job_result
        );

        (job_result, results)
    }
}
