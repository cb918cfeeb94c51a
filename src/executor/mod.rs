//! Test execution engine
//!
//! ```text
//! Job ──► Registry::select ──► ParallelDispatcher ──► WorkerPool
//!                                                      │  (pool_size workers,
//!                                                      │   bounded queue)
//!                                                      ▼
//!                                          RetryingExecutor (per unit)
//!                                                      │
//!                              aggregate() ◄───────────┘
//! ```
//!
//! Every selected unit runs to completion or to the end of its own retries;
//! there is no early exit on the first failure and no cancellation of
//! units already submitted. A unit that never returns holds its worker slot
//! for as long as it runs.

mod parallel;
mod pool;
mod retry;
mod runner;

pub use parallel::ParallelDispatcher;
pub use pool::WorkerPool;
pub use retry::RetryingExecutor;
pub use runner::JobRunner;

use std::any::Any;

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
