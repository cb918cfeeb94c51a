//! Job intake
//!
//! Sources of job messages and the consumer loop that drives each job
//! through the runner and the reporter, then acknowledges or dead-letters
//! the message.

mod memory;
mod spool;
mod worker;

pub use memory::MemoryQueue;
pub use spool::SpoolQueue;
pub use worker::Worker;

use async_trait::async_trait;
use thiserror::Error;

/// Intake errors
#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Malformed job payload in {id}: {reason}")]
    Malformed { id: String, reason: String },

    #[error("Spool I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown delivery: {0}")]
    UnknownDelivery(String),
}

/// One message handed to a consumer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub payload: Vec<u8>,
}

impl Delivery {
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }
}

/// What the consumer tells the transport once it is done with a message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acknowledgement {
    /// Done, remove the message
    Ack,
    /// Reject without requeue; the message goes to the dead-letter store
    Reject,
}

/// Transport the worker consumes jobs from
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Next pending message, or `None` when nothing is waiting right now
    async fn next(&self) -> Result<Option<Delivery>, IntakeError>;

    async fn settle(&self, delivery: &Delivery, ack: Acknowledgement) -> Result<(), IntakeError>;
}
