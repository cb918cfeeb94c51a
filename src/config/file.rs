//! Configuration file management
//!
//! Handles finding, loading, and validating configuration files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::{ApiSettings, ReportSettings, WorkerSettings};
use crate::results::ReportFormat;
use crate::suite::HttpCheckSpec;

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./test-runner.yaml",
    "./test-runner.yml",
    "./.test-runner.yaml",
    "~/.config/test-runner/config.yaml",
];

/// Full configuration file structure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Version of config file format
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub worker: WorkerSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub reports: ReportSettings,

    /// Target environments jobs can name
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,

    /// HTTP checks registered as test units
    #[serde(default)]
    pub checks: Vec<HttpCheckSpec>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            worker: WorkerSettings::default(),
            api: ApiSettings::default(),
            reports: ReportSettings::default(),
            environments: Vec::new(),
            checks: Vec::new(),
        }
    }
}

impl WorkerConfig {
    /// Find configuration file in standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(|location| expand_path(location))
            .find(|path| path.exists())
    }

    /// Load from `path`, or from the first standard location, or defaults
    pub fn resolve(path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        match path {
            Some(path) => Ok((Self::load(path)?, Some(path.to_path_buf()))),
            None => match Self::find() {
                Some(found) => Ok((Self::load(&found)?, Some(found))),
                None => Ok((Self::default(), None)),
            },
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !["1.0"].contains(&self.version.as_str()) {
            anyhow::bail!("Unsupported config version: {}", self.version);
        }

        if self.worker.pool_size == 0 {
            anyhow::bail!("worker.pool_size must be at least 1");
        }
        if self.worker.max_attempts == 0 {
            anyhow::bail!("worker.max_attempts must be at least 1");
        }
        if self.worker.queue_capacity == 0 {
            anyhow::bail!("worker.queue_capacity must be at least 1");
        }
        if self.api.report_attempts == 0 {
            anyhow::bail!("api.report_attempts must be at least 1");
        }

        for format in &self.reports.formats {
            if ReportFormat::from_str(format).is_none() {
                anyhow::bail!("Unknown report format '{}'. Valid: html, csv", format);
            }
        }

        let mut names = HashSet::new();
        for check in &self.checks {
            if check.url.trim().is_empty() {
                anyhow::bail!("Check '{}' has no url", check.name);
            }
            if !names.insert(check.name.as_str()) {
                anyhow::bail!("Duplicate check name '{}'", check.name);
            }
        }

        Ok(())
    }

    /// Generate example configuration
    pub fn example() -> Self {
        Self {
            environments: vec![
                EnvironmentConfig::new("dev", "http://localhost:3000"),
                EnvironmentConfig::new("staging", "https://staging.example.com"),
            ],
            checks: vec![
                HttpCheckSpec::new("api-health", "/actuator/health")
                    .tags(&["smoke", "api"])
                    .expect_json("/status", serde_json::json!("UP")),
                HttpCheckSpec::new("home-page", "/")
                    .tags(&["smoke", "ui"])
                    .expect_body("<html"),
                HttpCheckSpec::new("missing-page", "/does-not-exist")
                    .tags(&["regression"])
                    .expect_status(404),
            ],
            ..Self::default()
        }
    }

    /// Environment name -> base URL
    pub fn environment_urls(&self) -> HashMap<String, String> {
        self.environments
            .iter()
            .map(|e| (e.name.clone(), e.base_url.clone()))
            .collect()
    }
}

/// Named target environment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment name (e.g., "dev", "staging", "prod")
    pub name: String,
    /// Base URL relative check URLs resolve against
    pub base_url: String,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
