//! Data models for the test runner worker
//!
//! This module contains the job message, per-unit results and the
//! aggregated job outcome.

mod job;
mod test_result;

pub use job::{normalize_tag, parse_tags, Job, RunStatus, TagSet};
pub use test_result::{JobResult, Outcome, UnitResult};
