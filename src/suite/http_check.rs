//! Declarative HTTP check
//!
//! Requests a URL and asserts on the status code, an optional body
//! substring and optional JSON field values.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use super::{ExecutionContext, TestUnit, UnitInfo};
use crate::http::{join_url, HttpClient, HttpRequest};
use crate::models::UnitResult;

/// Check definition as it appears in the configuration file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HttpCheckSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Absolute URL, or a path resolved against the job environment's base URL
    pub url: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default = "default_status")]
    pub expected_status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_contains: Option<String>,

    /// JSON pointer -> expected value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub json_equals: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}

impl HttpCheckSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: Vec::new(),
            url: url.into(),
            method: default_method(),
            expected_status: default_status(),
            body_contains: None,
            json_equals: BTreeMap::new(),
            headers: HashMap::new(),
        }
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    pub fn expect_body(mut self, text: impl Into<String>) -> Self {
        self.body_contains = Some(text.into());
        self
    }

    pub fn expect_json(mut self, pointer: impl Into<String>, value: serde_json::Value) -> Self {
        self.json_equals.insert(pointer.into(), value);
        self
    }

    /// Human-readable summary of what is asserted
    pub fn parameters(&self) -> String {
        let mut parts = vec![format!("{} -> {}", self.method, self.expected_status)];
        if let Some(text) = &self.body_contains {
            parts.push(format!("body contains {text:?}"));
        }
        for (pointer, value) in &self.json_equals {
            parts.push(format!("{} == {}", pointer_path(pointer), value));
        }
        parts.join(", ")
    }
}

/// Test unit backed by an [`HttpCheckSpec`]
pub struct HttpCheck {
    info: UnitInfo,
    spec: HttpCheckSpec,
    client: HttpClient,
}

impl HttpCheck {
    pub fn new(spec: HttpCheckSpec, client: HttpClient) -> Self {
        let info = UnitInfo::new(&spec.name)
            .description(&spec.description)
            .tags(spec.tags.iter().map(String::as_str));
        Self { info, spec, client }
    }

    fn resolve_url(&self, ctx: &ExecutionContext) -> Result<String> {
        let url = &self.spec.url;
        if url.starts_with("http://") || url.starts_with("https://") {
            return Ok(url.clone());
        }
        let base = ctx.base_url.as_deref().with_context(|| {
            format!(
                "No base URL configured for environment '{}' to resolve {}",
                ctx.environment, url
            )
        })?;
        Ok(join_url(Some(base), url))
    }
}

#[async_trait]
impl TestUnit for HttpCheck {
    fn info(&self) -> &UnitInfo {
        &self.info
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<UnitResult> {
        let url = self.resolve_url(ctx)?;
        info!("Executing HTTP check '{}' against {}", self.spec.name, url);
        let started = Utc::now();

        let request = HttpRequest::new(self.spec.method.to_uppercase(), &url)
            .headers(self.spec.headers.clone());
        let response = self.client.send(request).await?;

        let mut failures = Vec::new();

        if response.status_code != self.spec.expected_status {
            failures.push(format!(
                "expected status {} but got {}",
                self.spec.expected_status, response.status_code
            ));
        }

        if let Some(text) = &self.spec.body_contains {
            if !response.body_contains(text) {
                failures.push(format!("body does not contain {text:?}"));
            }
        }

        if !self.spec.json_equals.is_empty() {
            match response.json() {
                Ok(document) => {
                    for (pointer, expected) in &self.spec.json_equals {
                        let path = pointer_path(pointer);
                        match document.pointer(&path) {
                            Some(actual) if actual == expected => {}
                            Some(actual) => failures
                                .push(format!("{path}: expected {expected} but got {actual}")),
                            None => failures.push(format!("{path}: missing from response")),
                        }
                    }
                }
                Err(e) => failures.push(e.to_string()),
            }
        }

        debug!(
            "HTTP check '{}' finished with {} failure(s) in {}ms",
            self.spec.name,
            failures.len(),
            response.duration_ms
        );

        let result = if failures.is_empty() {
            UnitResult::succeeded(started)
        } else {
            UnitResult::failed(started, format!("HTTP check FAILED: {}", failures.join("; ")))
        };

        Ok(result
            .with_description(&self.spec.description)
            .with_target(url)
            .with_parameters(self.spec.parameters()))
    }
}

/// Accept both `userId` and `/userId` as a JSON pointer
fn pointer_path(pointer: &str) -> String {
    if pointer.starts_with('/') {
        pointer.to_string()
    } else {
        format!("/{pointer}")
    }
}
