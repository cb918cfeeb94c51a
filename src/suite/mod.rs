//! Test unit registry
//!
//! Test units register themselves once at start-up with a name, a
//! description and a tag set. A job selects every unit whose tags are a
//! superset of the job's requested tags.
//!
//! ## Built-in units
//!
//! - [`HttpCheck`]: request a URL and assert on status, body and JSON fields

mod http_check;

pub use http_check::{HttpCheck, HttpCheckSpec};

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::models::{normalize_tag, TagSet, UnitResult};

/// Static description of a test unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitInfo {
    pub name: String,
    pub description: String,
    pub tags: TagSet,
}

impl UnitInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tags: TagSet::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        let tag = normalize_tag(tag);
        if !tag.is_empty() {
            self.tags.insert(tag);
        }
        self
    }

    pub fn tags<'a>(self, tags: impl IntoIterator<Item = &'a str>) -> Self {
        tags.into_iter().fold(self, |info, t| info.tag(t))
    }

    /// Whether this unit satisfies a requested tag set.
    ///
    /// An empty request only matches units that declare no tags.
    pub fn matches(&self, requested: &TagSet) -> bool {
        if requested.is_empty() {
            self.tags.is_empty()
        } else {
            requested.is_subset(&self.tags)
        }
    }
}

impl fmt::Display for UnitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags = self.tags.iter().cloned().collect::<Vec<_>>().join(",");
        write!(f, "{} [{}]", self.name, tags)
    }
}

/// Per-invocation inputs handed to a unit
#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    pub run_id: String,
    pub environment: String,
    /// Base URL of the job's environment, when configured
    pub base_url: Option<String>,
}

impl ExecutionContext {
    pub fn new(run_id: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            environment: environment.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// One independently executable check.
///
/// Units are shared between concurrently running jobs and must not keep
/// per-invocation state between calls.
#[async_trait]
pub trait TestUnit: Send + Sync {
    fn info(&self) -> &UnitInfo;

    /// Run the check once. An `Err` is an invocation fault, not a verdict.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<UnitResult>;
}

/// Read-only set of registered units
#[derive(Clone, Default)]
pub struct Registry {
    units: Vec<Arc<dyn TestUnit>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Units whose tags are a superset of `requested`, in no guaranteed order
    pub fn select(&self, requested: &TagSet) -> Vec<Arc<dyn TestUnit>> {
        self.units
            .iter()
            .filter(|u| u.info().matches(requested))
            .cloned()
            .collect()
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitInfo> {
        self.units.iter().map(|u| u.info())
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Collects units at start-up
#[derive(Default)]
pub struct RegistryBuilder {
    units: Vec<Arc<dyn TestUnit>>,
}

impl RegistryBuilder {
    pub fn register(mut self, unit: impl TestUnit + 'static) -> Self {
        self.push(Arc::new(unit));
        self
    }

    #[cfg(test)]
    pub fn register_arc(mut self, unit: Arc<dyn TestUnit>) -> Self {
        self.push(unit);
        self
    }

    fn push(&mut self, unit: Arc<dyn TestUnit>) {
        let name = &unit.info().name;
        if self.units.iter().any(|u| &u.info().name == name) {
            warn!("Test unit '{}' registered twice, keeping the first", name);
            return;
        }
        self.units.push(unit);
    }

    pub fn build(self) -> Registry {
        Registry { units: self.units }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted units shared by the executor and pipeline tests

    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// What a scripted unit does on a given call
    #[derive(Clone, Copy, Debug)]
    pub enum Step {
        Pass,
        Fail,
        Error,
        Panic,
    }

    /// Unit that plays back a fixed script, repeating the last step
    pub struct ScriptedUnit {
        info: UnitInfo,
        script: Vec<Step>,
        calls: AtomicU32,
    }

    impl ScriptedUnit {
        pub fn new(name: &str, tags: &[&str], script: Vec<Step>) -> Self {
            Self {
                info: UnitInfo::new(name).tags(tags.iter().copied()),
                script,
                calls: AtomicU32::new(0),
            }
        }

        pub fn passing(name: &str, tags: &[&str]) -> Self {
            Self::new(name, tags, vec![Step::Pass])
        }

        pub fn failing(name: &str, tags: &[&str]) -> Self {
            Self::new(name, tags, vec![Step::Fail])
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TestUnit for ScriptedUnit {
        fn info(&self) -> &UnitInfo {
            &self.info
        }

        async fn execute(&self, _ctx: &ExecutionContext) -> Result<UnitResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let step = self
                .script
                .get(call)
                .or(self.script.last())
                .copied()
                .unwrap_or(Step::Pass);
            let started = Utc::now();

            match step {
                Step::Pass => Ok(UnitResult::succeeded(started)),
                Step::Fail => Ok(UnitResult::failed(
                    started,
                    format!("assertion failed on call {}", call + 1),
                )),
                Step::Error => anyhow::bail!("connection refused"),
                Step::Panic => panic!("unit blew up"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedUnit;
    use super::*;
    use crate::models::parse_tags;

    fn registry() -> Registry {
        Registry::builder()
            .register(ScriptedUnit::passing("ui-search", &["ui", "smoke"]))
            .register(ScriptedUnit::passing("api-content", &["api", "smoke"]))
            .register(ScriptedUnit::passing("api-slow", &["api", "regression"]))
            .register(ScriptedUnit::passing("untagged", &[]))
            .build()
    }

    #[test]
    fn test_select_superset() {
        let registry = registry();
        let requested = parse_tags("smoke");
        let selected = registry.select(&requested);

        assert_eq!(selected.len(), 2);
        for unit in &selected {
            assert!(requested.is_subset(&unit.info().tags));
        }
    }

    #[test]
    fn test_select_requires_all_tags() {
        let registry = registry();
        let selected = registry.select(&parse_tags("ui,smoke"));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].info().name, "ui-search");

        assert!(registry.select(&parse_tags("ui,regression")).is_empty());
    }

    #[test]
    fn test_select_is_case_and_space_insensitive() {
        let registry = registry();
        let selected = registry.select(&parse_tags("  API ,Regression"));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].info().name, "api-slow");
    }

    #[test]
    fn test_select_exact_match_only() {
        let registry = registry();
        assert!(registry.select(&parse_tags("smo")).is_empty());
        assert!(registry.select(&parse_tags("nonexistent")).is_empty());
    }

    #[test]
    fn test_empty_request_matches_untagged_only() {
        let registry = registry();
        let selected = registry.select(&TagSet::new());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].info().name, "untagged");
    }

    #[test]
    fn test_selection_property_over_many_requests() {
        let registry = registry();
        let requests = ["", "ui", "api", "smoke", "api,smoke", "ui,api", "regression", "x"];

        for raw in requests {
            let requested = parse_tags(raw);
            let selected = registry.select(&requested);
            for unit in &selected {
                assert!(unit.info().matches(&requested));
            }
            let expected = registry.units().filter(|u| u.matches(&requested)).count();
            assert_eq!(selected.len(), expected, "request {raw:?}");
        }
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let registry = Registry::builder()
            .register(ScriptedUnit::passing("dup", &["a"]))
            .register(ScriptedUnit::passing("dup", &["b"]))
            .build();

        assert_eq!(registry.len(), 1);
        assert!(registry.units().next().unwrap().tags.contains("a"));
    }

    #[test]
    fn test_unit_info_normalizes_tags() {
        let info = UnitInfo::new("x").tags([" UI", "Smoke ", ""]);
        assert_eq!(info.tags.len(), 2);
        assert!(info.tags.contains("ui"));
        assert_eq!(info.to_string(), "x [smoke,ui]");
    }

    #[test]
    fn test_scripted_unit_runs() {
        let unit = ScriptedUnit::passing("blocking", &[]);
        let ctx = ExecutionContext::new("r1", "dev");
        let result = tokio_test::block_on(unit.execute(&ctx)).unwrap();
        assert!(result.is_success());
        assert_eq!(unit.calls(), 1);
    }
}
