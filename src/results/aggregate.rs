//! Job result aggregation
//!
//! Combines the per-unit results of one job into a single [`JobResult`].

use crate::models::{JobResult, Outcome, UnitResult};

/// Aggregate unit results in the order they were processed.
///
/// `report_url` is the report path of the *last* result in `results`, even
/// when that result has none. Callers pass results in completion order, so
/// which report wins is not deterministic across runs.
///
/// An empty slice never aggregates to success: it yields the same result
/// as a job whose tags selected nothing.
pub fn aggregate(results: &[UnitResult]) -> JobResult {
    if results.is_empty() {
        return JobResult::no_matching_units("");
    }

    let failed: Vec<&UnitResult> = results.iter().filter(|r| !r.is_success()).collect();

    let combined_error_message = if failed.is_empty() {
        None
    } else {
        Some(
            failed
                .iter()
                .map(|r| {
                    format!(
                        "[{}]: {}",
                        r.unit_name,
                        r.error_message.as_deref().unwrap_or("failed")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        )
    };

    let error_details = if failed.is_empty() {
        None
    } else {
        Some(
            failed
                .iter()
                .map(|r| {
                    format!(
                        "{} (attempt {}, {}ms, target: {}): {}",
                        r.unit_name,
                        r.attempts,
                        r.duration_ms,
                        r.target.as_deref().unwrap_or("-"),
                        r.error_message.as_deref().unwrap_or("failed")
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        )
    };

    let report_url = results
        .last()
        .and_then(|r| r.report_path.as_ref())
        .map(|p| p.to_string_lossy().replace('\\', "/"));

    let screenshot_path = results
        .iter()
        .rev()
        .find_map(|r| r.screenshot_path.as_ref())
        .map(|p| p.display().to_string());

    let started = results.iter().map(|r| r.started_at).min();
    let finished = results.iter().map(|r| r.finished_at).max();
    let duration_ms = match (started, finished) {
        (Some(s), Some(f)) => (f - s).num_milliseconds().max(0) as u64,
        _ => 0,
    };

    JobResult {
        outcome: if failed.is_empty() {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        },
        failure_count: failed.len(),
        combined_error_message,
        error_details,
        report_url,
        screenshot_path,
        unit_count: results.len(),
        duration_ms,
    }
}
