//! Job outcome delivery
//!
//! Sends the aggregated [`JobResult`](crate::models::JobResult) of a run to
//! the record-keeping service, retrying a bounded number of times.

mod client;
mod reliable;

pub use client::{DeliveryError, HttpRunStatusClient, RunStatusClient, RunUpdate};
pub use reliable::ReliableReporter;
