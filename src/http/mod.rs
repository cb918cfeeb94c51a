//! HTTP client module
//!
//! Shared by the HTTP test units and the run-status reporter.

mod client;

pub use client::{HttpClient, HttpRequest};
pub(crate) use client::join_url;

#[cfg(test)]
pub(crate) mod stub;
