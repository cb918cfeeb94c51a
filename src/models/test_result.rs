//! Result models
//!
//! Defines per-unit results and the aggregated job result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::RunStatus;

/// Outcome of one execution attempt or of a whole job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Succeeded,
    Failed,
}

impl Outcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            Outcome::Succeeded => "✓",
            Outcome::Failed => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    /// Status reported to the management API for a finished run
    pub fn run_status(&self) -> RunStatus {
        match self {
            Outcome::Succeeded => RunStatus::Completed,
            Outcome::Failed => RunStatus::Failed,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded => write!(f, "PASS"),
            Outcome::Failed => write!(f, "FAIL"),
        }
    }
}

/// Result of a single test unit execution attempt
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitResult {
    /// Name of the unit that produced the result, stamped by the executor
    pub unit_name: String,
    pub description: Option<String>,
    /// What the unit exercised (usually a URL)
    pub target: Option<String>,
    pub parameters: Option<String>,
    pub outcome: Outcome,
    pub error_message: Option<String>,
    pub report_path: Option<PathBuf>,
    pub screenshot_path: Option<PathBuf>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Attempt number that produced this result (1-based)
    pub attempts: u32,
}

impl UnitResult {
    /// Finish a result that started at `started_at`
    pub fn new(outcome: Outcome, started_at: DateTime<Utc>) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;

        Self {
            unit_name: String::new(),
            description: None,
            target: None,
            parameters: None,
            outcome,
            error_message: None,
            report_path: None,
            screenshot_path: None,
            started_at,
            finished_at,
            duration_ms,
            attempts: 1,
        }
    }

    pub fn succeeded(started_at: DateTime<Utc>) -> Self {
        Self::new(Outcome::Succeeded, started_at)
    }

    pub fn failed(started_at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self::new(Outcome::Failed, started_at).with_error(message)
    }

    /// Failed result that no real execution produced
    pub fn synthetic_failure(unit_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::failed(Utc::now(), message).with_unit_name(unit_name)
    }

    pub fn with_unit_name(mut self, name: impl Into<String>) -> Self {
        self.unit_name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = Some(parameters.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    #[cfg(test)]
    pub fn with_screenshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

impl fmt::Display for UnitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms, attempt {}]",
            self.outcome.symbol(),
            self.unit_name,
            self.duration_ms,
            self.attempts
        )?;
        if let Some(msg) = &self.error_message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Job-level outcome derived from all unit results of one job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub outcome: Outcome,
    pub failure_count: usize,
    pub combined_error_message: Option<String>,
    pub error_details: Option<String>,
    pub report_url: Option<String>,
    pub screenshot_path: Option<String>,
    pub unit_count: usize,
    pub duration_ms: u64,
}

impl JobResult {
    /// Result for a job whose tags selected nothing
    pub fn no_matching_units(requested: &str) -> Self {
        Self {
            outcome: Outcome::Failed,
            failure_count: 1,
            combined_error_message: Some(format!(
                "No tests found for the specified tags: [{requested}] (no matching tests)"
            )),
            error_details: None,
            report_url: None,
            screenshot_path: None,
            unit_count: 0,
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn run_status(&self) -> RunStatus {
        self.outcome.run_status()
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} - {} unit(s), {} failed, {}ms",
            self.outcome.symbol(),
            self.run_status(),
            self.unit_count,
            self.failure_count,
            self.duration_ms
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_result_creation() {
        let result = UnitResult::succeeded(Utc::now()).with_unit_name("api-content");
        assert!(result.is_success());
        assert_eq!(result.unit_name, "api-content");
        assert!(result.error_message.is_none());
        assert!(result.finished_at >= result.started_at);
    }

    #[test]
    fn test_failed_result_keeps_message() {
        let result = UnitResult::failed(Utc::now(), "status 500");
        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.error_message.as_deref(), Some("status 500"));
    }

    #[test]
    fn test_outcome_status_mapping() {
        assert_eq!(Outcome::Succeeded.run_status(), RunStatus::Completed);
        assert_eq!(Outcome::Failed.run_status(), RunStatus::Failed);
    }

    #[test]
    fn test_no_matching_units_result() {
        let result = JobResult::no_matching_units("nonexistent");
        assert_eq!(result.outcome, Outcome::Failed);
        assert_eq!(result.failure_count, 1);
        assert!(result
            .combined_error_message
            .unwrap()
            .contains("no matching"));
    }
}
