//! Configuration module
//!
//! Settings sections of the worker configuration file, plus file discovery
//! and environment variable overrides.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::WorkerConfig;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::results::ReportFormat;

/// Test execution settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Concurrent test executions per job
    pub pool_size: usize,

    /// Attempts per test unit (1 = no retry)
    pub max_attempts: u32,

    /// Submissions waiting for a free worker before `submit` blocks
    pub queue_capacity: usize,

    /// Concurrent job consumers
    pub consumers: usize,

    /// Idle wait between polls of an empty job source
    pub poll_interval_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            pool_size: 5,
            max_attempts: 3,
            queue_capacity: 10,
            consumers: 5,
            poll_interval_ms: 500,
        }
    }
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Management API settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,

    /// Delivery attempts before a job is dead-lettered
    pub report_attempts: u32,

    pub retry_delay_ms: u64,

    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            report_attempts: 3,
            retry_delay_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Report artifact settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    pub directory: PathBuf,
    pub formats: Vec<String>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("reports"),
            formats: vec!["html".to_string(), "csv".to_string()],
        }
    }
}

impl ReportSettings {
    /// Recognised formats, in configured order; unknown names are skipped
    pub fn formats(&self) -> Vec<ReportFormat> {
        self.formats
            .iter()
            .filter_map(|f| ReportFormat::from_str(f))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let worker = WorkerSettings::default();
        assert_eq!(worker.pool_size, 5);
        assert_eq!(worker.max_attempts, 3);
        assert_eq!(worker.queue_capacity, 10);
        assert_eq!(worker.consumers, 5);

        let api = ApiSettings::default();
        assert_eq!(api.report_attempts, 3);
        assert_eq!(api.retry_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_report_formats() {
        let reports = ReportSettings {
            directory: PathBuf::from("out"),
            formats: vec!["CSV".to_string(), "pdf".to_string(), "html".to_string()],
        };
        assert_eq!(reports.formats(), vec![ReportFormat::Csv, ReportFormat::Html]);
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let worker: WorkerSettings = serde_yaml::from_str("pool_size: 2").unwrap();
        assert_eq!(worker.pool_size, 2);
        assert_eq!(worker.max_attempts, 3);
    }
}
