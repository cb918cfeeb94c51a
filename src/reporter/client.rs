//! Run status API client

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::http::HttpClient;
use crate::models::{JobResult, RunStatus};

/// Failure of a single delivery attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Status API answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to encode run update: {0}")]
    Encode(String),
}

/// Body of `PUT /api/runs/{id}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunUpdate {
    pub status: RunStatus,
    pub report_url: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
    pub failed_test_count: usize,
    pub screenshot_path: Option<String>,
}

impl From<&JobResult> for RunUpdate {
    fn from(result: &JobResult) -> Self {
        Self {
            status: result.run_status(),
            report_url: result.report_url.clone(),
            error_message: result.combined_error_message.clone(),
            error_details: result.error_details.clone(),
            failed_test_count: result.failure_count,
            screenshot_path: result.screenshot_path.clone(),
        }
    }
}

/// Record-keeping service endpoint for run status updates
#[async_trait]
pub trait RunStatusClient: Send + Sync {
    async fn update_run(&self, run_id: &str, update: &RunUpdate) -> Result<(), DeliveryError>;
}

/// [`RunStatusClient`] speaking HTTP to the management API
#[derive(Clone, Debug)]
pub struct HttpRunStatusClient {
    http: HttpClient,
    base_url: String,
}

impl HttpRunStatusClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub fn run_url(&self, run_id: &str) -> String {
        format!("{}/api/runs/{}", self.base_url.trim_end_matches('/'), run_id)
    }
}

#[async_trait]
impl RunStatusClient for HttpRunStatusClient {
    async fn update_run(&self, run_id: &str, update: &RunUpdate) -> Result<(), DeliveryError> {
        let url = self.run_url(run_id);
        let body = encode_body(update)?;
        debug!("PUT {} status={}", url, update.status);

        let response = self
            .http
            .put_json(&url, body)
            .await
            .map_err(|e| DeliveryError::Transport(format!("{e:#}")))?;

        if response.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                status: response.status_code,
                body: response.body,
            })
        }
    }
}

fn encode_body<T: Serialize + ?Sized>(body: &T) -> Result<String, DeliveryError> {
    serde_json::to_string(body).map_err(|e| DeliveryError::Encode(e.to_string()))
}
