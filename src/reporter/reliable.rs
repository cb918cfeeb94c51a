//! Bounded-retry delivery of job results

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{DeliveryError, RunStatusClient, RunUpdate};
use crate::models::JobResult;

/// Terminal state of one report
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportOutcome {
    Delivered { attempts: u32 },
    DeadLettered { attempts: u32, last_error: DeliveryError },
}

impl ReportOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, ReportOutcome::Delivered { .. })
    }
}

impl fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportOutcome::Delivered { attempts } => {
                write!(f, "delivered after {attempts} attempt(s)")
            }
            ReportOutcome::DeadLettered {
                attempts,
                last_error,
            } => write!(f, "dead-lettered after {attempts} attempt(s): {last_error}"),
        }
    }
}

/// Delivers job results, retrying every failure the same way
#[derive(Clone)]
pub struct ReliableReporter {
    client: Arc<dyn RunStatusClient>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ReliableReporter {
    pub fn new(client: Arc<dyn RunStatusClient>, max_attempts: u32) -> Self {
        Self {
            client,
            max_attempts: max_attempts.max(1),
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Send the result for `run_id`; never returns an error.
    pub async fn report(&self, run_id: &str, result: &JobResult) -> ReportOutcome {
        let update = RunUpdate::from(result);
        let mut attempt = 1;

        loop {
            match self.client.update_run(run_id, &update).await {
                Ok(()) => {
                    info!(
                        "Reported {} for run {} (attempt {})",
                        update.status, run_id, attempt
                    );
                    return ReportOutcome::Delivered { attempts: attempt };
                }
                Err(e) if attempt >= self.max_attempts => {
                    error!(
                        "Giving up on run {} after {} attempts: {}",
                        run_id, attempt, e
                    );
                    return ReportOutcome::DeadLettered {
                        attempts: attempt,
                        last_error: e,
                    };
                }
                Err(e) => {
                    warn!(
                        "Reporting run {} failed on attempt {}/{}: {}",
                        run_id, attempt, self.max_attempts, e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
