//! Retrying unit executor
//!
//! Runs one test unit up to `max_attempts` times, returning on the first
//! success. Errors and panics raised by the unit become failed results;
//! nothing escapes to the caller.

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::panic_message;
use crate::models::UnitResult;
use crate::results::ReportSet;
use crate::suite::{ExecutionContext, TestUnit};

/// Executes a unit with immediate, backoff-free retries
pub struct RetryingExecutor {
    max_attempts: u32,
    reports: Arc<ReportSet>,
}

impl RetryingExecutor {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            reports: Arc::new(ReportSet::new()),
        }
    }

    /// Generate these reports after every attempt
    pub fn with_reports(mut self, reports: Arc<ReportSet>) -> Self {
        self.reports = reports;
        self
    }

    /// Run `unit` until it succeeds or the attempts are used up.
    ///
    /// The returned result is the first success, or the last failure with
    /// the unit's name stamped on it.
    pub async fn run(&self, unit: &dyn TestUnit, ctx: &ExecutionContext) -> UnitResult {
        let name = unit.info().name.clone();
        let mut attempt = 1;

        loop {
            info!(
                "Attempt {} of {} for test '{}'",
                attempt, self.max_attempts, name
            );
            let result = self.attempt(unit, ctx, attempt).await;

            if result.is_success() {
                info!("Test '{}' passed on attempt {}", name, attempt);
                return result;
            }

            if attempt >= self.max_attempts {
                error!(
                    "Test '{}' failed after {} attempts",
                    name, self.max_attempts
                );
                return result;
            }

            warn!(
                "Test '{}' failed on attempt {}: {}. Retrying...",
                name,
                attempt,
                result.error_message.as_deref().unwrap_or("no message")
            );
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        unit: &dyn TestUnit,
        ctx: &ExecutionContext,
        attempt: u32,
    ) -> UnitResult {
        let info = unit.info();
        let started = Utc::now();

        let mut result = match AssertUnwindSafe(unit.execute(ctx)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Test '{}' raised an error: {:#}", info.name, e);
                UnitResult::failed(started, format!("Test invocation failed: {e:#}"))
            }
            Err(payload) => {
                let message = panic_message(payload);
                error!("Test '{}' panicked: {}", info.name, message);
                UnitResult::failed(
                    started,
                    format!("Exception during test invocation: {message}"),
                )
            }
        };

        result.unit_name = info.name.clone();
        if result.description.is_none() && !info.description.is_empty() {
            result.description = Some(info.description.clone());
        }
        result.attempts = attempt;

        if let Some(path) = self.reports.clone().spawn_generate(&result, &ctx.run_id).await {
            result.report_path = Some(path);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Outcome;
    use crate::results::ReportFormat;
    use crate::suite::testing::{ScriptedUnit, Step};
    use std::fs;
    use tempfile::tempdir;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("run-1", "dev")
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let unit = ScriptedUnit::passing("ok", &["smoke"]);
        let result = RetryingExecutor::new(3).run(&unit, &ctx()).await;

        assert_eq!(result.outcome, Outcome::Succeeded);
        assert_eq!(result.attempts, 1);
        assert_eq!(unit.calls(), 1);
        assert_eq!(result.unit_name, "ok");
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let unit = ScriptedUnit::new("flaky", &[], vec![Step::Fail, Step::Pass, Step::Fail]);
        let result = RetryingExecutor::new(3).run(&unit, &ctx()).await;

        assert_eq!(result.outcome, Outcome::Succeeded);
        assert_eq!(result.attempts, 2);
        assert_eq!(unit.calls(), 2);
    }

    #[tokio::test]
    async fn test_returns_last_failure_after_max_attempts() {
        let unit = ScriptedUnit::failing("broken", &[]);
        let result = RetryingExecutor::new(3).run(&unit, &ctx()).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(unit.calls(), 3);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.unit_name, "broken");
        assert_eq!(
            result.error_message.as_deref(),
            Some("assertion failed on call 3")
        );
    }

    #[tokio::test]
    async fn test_errors_and_panics_become_failures() {
        let unit = ScriptedUnit::new("faulty", &[], vec![Step::Error, Step::Panic]);
        let result = RetryingExecutor::new(2).run(&unit, &ctx()).await;

        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(unit.calls(), 2);
        assert_eq!(
            result.error_message.as_deref(),
            Some("Exception during test invocation: unit blew up")
        );

        let unit = ScriptedUnit::new("refused", &[], vec![Step::Error]);
        let result = RetryingExecutor::new(1).run(&unit, &ctx()).await;
        assert_eq!(
            result.error_message.as_deref(),
            Some("Test invocation failed: connection refused")
        );
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let unit = ScriptedUnit::failing("once", &[]);
        let executor = RetryingExecutor::new(0);

        executor.run(&unit, &ctx()).await;
        assert_eq!(unit.calls(), 1);
    }

    #[tokio::test]
    async fn test_reports_written_every_attempt_last_kept() {
        let dir = tempdir().unwrap();
        let reports = Arc::new(ReportSet::from_formats(&[ReportFormat::Html], dir.path()));
        let unit = ScriptedUnit::new("flaky", &[], vec![Step::Fail, Step::Fail, Step::Pass]);

        let result = RetryingExecutor::new(3)
            .with_reports(reports)
            .run(&unit, &ctx())
            .await;

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
        let path = result.report_path.unwrap();
        let html = fs::read_to_string(path).unwrap();
        assert!(html.contains("COMPLETED"));
    }
}
