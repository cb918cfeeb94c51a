//! Job message model
//!
//! A job is what the producer publishes on the queue: a run id, the
//! environment to test against and the tags selecting which units run.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Normalised tag set (trimmed, lower-cased, no empty entries)
pub type TagSet = BTreeSet<String>;

/// Lifecycle status of a run as stored by the management API
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Scheduled,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Scheduled => write!(f, "SCHEDULED"),
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Completed => write!(f, "COMPLETED"),
            RunStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// One request to run a tagged subset of test units against an environment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub run_id: String,

    #[serde(default)]
    pub environment: String,

    #[serde(default, deserialize_with = "deserialize_tags", serialize_with = "serialize_tags")]
    pub tags: TagSet,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
}

impl Job {
    pub fn new(run_id: impl Into<String>, environment: impl Into<String>, tags: &str) -> Self {
        Self {
            run_id: run_id.into(),
            environment: environment.into(),
            tags: parse_tags(tags),
            status: Some(RunStatus::Scheduled),
        }
    }

    /// Decode a job from a raw queue payload
    pub fn from_payload(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    /// Encode the job as it travels on the queue
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Tags joined the way the producer writes them
    pub fn tags_display(&self) -> String {
        self.tags.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run {} (env: {}, tags: [{}])",
            self.run_id,
            if self.environment.is_empty() {
                "-"
            } else {
                &self.environment
            },
            self.tags_display()
        )
    }
}

/// Trim and lower-case a single tag
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Parse a comma-separated tag list
pub fn parse_tags(raw: &str) -> TagSet {
    raw.split(',')
        .map(normalize_tag)
        .filter(|t| !t.is_empty())
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTags {
    Joined(String),
    List(Vec<String>),
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<TagSet, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTags>::deserialize(deserializer)?;
    Ok(match raw {
        None => TagSet::new(),
        Some(RawTags::Joined(s)) => parse_tags(&s),
        Some(RawTags::List(list)) => list
            .iter()
            .map(|t| normalize_tag(t))
            .filter(|t| !t.is_empty())
            .collect(),
    })
}

fn serialize_tags<S>(tags: &TagSet, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let joined = tags.iter().cloned().collect::<Vec<_>>().join(",");
    serializer.serialize_str(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags_normalizes() {
        let tags = parse_tags(" UI , smoke,,");
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("ui"));
        assert!(tags.contains("smoke"));
    }

    #[test]
    fn test_parse_empty_tags() {
        assert!(parse_tags("").is_empty());
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn test_job_from_producer_payload() {
        let payload = br#"{
            "runId": "5f0c6a8e-1111-2222-3333-444455556666",
            "status": "SCHEDULED",
            "startTime": "2024-05-01T10:00:00",
            "environment": "staging",
            "tags": "ui, Smoke",
            "reportUrl": null
        }"#;

        let job = Job::from_payload(payload).unwrap();
        assert_eq!(job.run_id, "5f0c6a8e-1111-2222-3333-444455556666");
        assert_eq!(job.environment, "staging");
        assert_eq!(job.status, Some(RunStatus::Scheduled));
        assert!(job.tags.contains("ui"));
        assert!(job.tags.contains("smoke"));
    }

    #[test]
    fn test_job_tags_as_list() {
        let payload = br#"{"runId": "r1", "tags": ["API", " smoke "]}"#;
        let job = Job::from_payload(payload).unwrap();
        assert_eq!(job.tags_display(), "api,smoke");
        assert_eq!(job.environment, "");
    }

    #[test]
    fn test_job_payload_keeps_producer_format() {
        let job = Job::new("r2", "dev", "smoke,api");
        let value: serde_json::Value = serde_json::from_slice(&job.to_payload().unwrap()).unwrap();
        assert_eq!(value["runId"], "r2");
        assert_eq!(value["tags"], "api,smoke");
        assert_eq!(value["status"], "SCHEDULED");
    }

    #[test]
    fn test_malformed_payload() {
        assert!(Job::from_payload(b"not json").is_err());
        assert!(Job::from_payload(br#"{"environment": "dev"}"#).is_err());
    }
}
