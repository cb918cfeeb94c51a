//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;
use tracing::debug;

use super::WorkerConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "TEST_RUNNER";

/// Overrides read from environment variables
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// Management API base URL from TEST_RUNNER_API_URL
    pub api_url: Option<String>,
    /// From TEST_RUNNER_POOL_SIZE
    pub pool_size: Option<usize>,
    /// From TEST_RUNNER_MAX_ATTEMPTS
    pub max_attempts: Option<u32>,
    /// From TEST_RUNNER_QUEUE_CAPACITY
    pub queue_capacity: Option<usize>,
    /// From TEST_RUNNER_CONSUMERS
    pub consumers: Option<usize>,
    /// From TEST_RUNNER_REPORTS_DIR
    pub reports_dir: Option<String>,
    /// Config file from TEST_RUNNER_CONFIG
    pub config_file: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            api_url: get_env("API_URL"),
            pool_size: get_env_parse("POOL_SIZE"),
            max_attempts: get_env_parse("MAX_ATTEMPTS"),
            queue_capacity: get_env_parse("QUEUE_CAPACITY"),
            consumers: get_env_parse("CONSUMERS"),
            reports_dir: get_env("REPORTS_DIR"),
            config_file: get_env("CONFIG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.api_url.is_some()
            || self.pool_size.is_some()
            || self.max_attempts.is_some()
            || self.queue_capacity.is_some()
            || self.consumers.is_some()
            || self.reports_dir.is_some()
            || self.config_file.is_some()
    }

    /// Overlay the set variables onto a loaded configuration
    pub fn apply_to(&self, config: &mut WorkerConfig) {
        if let Some(url) = &self.api_url {
            debug!("{ENV_PREFIX}_API_URL overrides api.base_url");
            config.api.base_url = url.clone();
        }
        if let Some(size) = self.pool_size {
            config.worker.pool_size = size;
        }
        if let Some(attempts) = self.max_attempts {
            config.worker.max_attempts = attempts;
        }
        if let Some(capacity) = self.queue_capacity {
            config.worker.queue_capacity = capacity;
        }
        if let Some(consumers) = self.consumers {
            config.worker.consumers = consumers;
        }
        if let Some(dir) = &self.reports_dir {
            config.reports.directory = PathBuf::from(dir);
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_API_URL:         {:?}", ENV_PREFIX, self.api_url);
        println!("  {}_POOL_SIZE:       {:?}", ENV_PREFIX, self.pool_size);
        println!("  {}_MAX_ATTEMPTS:    {:?}", ENV_PREFIX, self.max_attempts);
        println!("  {}_QUEUE_CAPACITY:  {:?}", ENV_PREFIX, self.queue_capacity);
        println!("  {}_CONSUMERS:       {:?}", ENV_PREFIX, self.consumers);
        println!("  {}_REPORTS_DIR:     {:?}", ENV_PREFIX, self.reports_dir);
        println!("  {}_CONFIG:          {:?}", ENV_PREFIX, self.config_file);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub(crate) struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub(crate) struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all TEST_RUNNER environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_API_URL         Management API base URL");
    println!("  {ENV_PREFIX}_POOL_SIZE       Concurrent tests per job");
    println!("  {ENV_PREFIX}_MAX_ATTEMPTS    Attempts per test");
    println!("  {ENV_PREFIX}_QUEUE_CAPACITY  Pending submissions per worker pool");
    println!("  {ENV_PREFIX}_CONSUMERS       Concurrent job consumers");
    println!("  {ENV_PREFIX}_REPORTS_DIR     Directory for HTML/CSV reports");
    println!("  {ENV_PREFIX}_CONFIG          Path to configuration file");
    println!("  RUST_LOG                    Log filter (overrides --verbose)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_API_URL=http://test-management-api:8080");
    println!("  export {ENV_PREFIX}_POOL_SIZE=8");
    println!("  test-runner-worker worker --spool ./spool");
}
