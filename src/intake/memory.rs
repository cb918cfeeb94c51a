//! In-process job queue

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::{Acknowledgement, Delivery, IntakeError, JobSource};
#[cfg(test)]
use crate::models::Job;

#[derive(Default)]
struct State {
    pending: VecDeque<Delivery>,
    in_flight: Vec<String>,
    acked: Vec<String>,
    rejected: Vec<Delivery>,
}

/// Queue kept in memory, recording every ack and reject
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<State>,
    next_id: AtomicU64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw payload; returns the delivery id
    pub fn push_raw(&self, payload: impl Into<Vec<u8>>) -> String {
        let id = format!("msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.lock().pending.push_back(Delivery::new(id.clone(), payload));
        id
    }

    #[cfg(test)]
    pub fn push(&self, job: &Job) -> serde_json::Result<String> {
        Ok(self.push_raw(job.to_payload()?))
    }

    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    #[cfg(test)]
    pub fn acked(&self) -> Vec<String> {
        self.lock().acked.clone()
    }

    /// Messages rejected without requeue
    pub fn dead_letters(&self) -> Vec<Delivery> {
        self.lock().rejected.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned queue still holds consistent bookkeeping.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JobSource for MemoryQueue {
    async fn next(&self) -> Result<Option<Delivery>, IntakeError> {
        let mut state = self.lock();
        let delivery = state.pending.pop_front();
        if let Some(d) = &delivery {
            state.in_flight.push(d.id.clone());
        }
        Ok(delivery)
    }

    async fn settle(&self, delivery: &Delivery, ack: Acknowledgement) -> Result<(), IntakeError> {
        let mut state = self.lock();
        let pos = state
            .in_flight
            .iter()
            .position(|id| id == &delivery.id)
            .ok_or_else(|| IntakeError::UnknownDelivery(delivery.id.clone()))?;
        state.in_flight.remove(pos);

        match ack {
            Acknowledgement::Ack => state.acked.push(delivery.id.clone()),
            Acknowledgement::Reject => state.rejected.push(delivery.clone()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_and_bookkeeping() {
        let queue = MemoryQueue::new();
        let first = queue.push(&Job::new("r1", "dev", "smoke")).unwrap();
        let second = queue.push_raw("not json");
        assert_eq!(queue.pending(), 2);

        let d1 = queue.next().await.unwrap().unwrap();
        let d2 = queue.next().await.unwrap().unwrap();
        assert_eq!(d1.id, first);
        assert_eq!(d2.id, second);
        assert!(queue.next().await.unwrap().is_none());
        assert_eq!(queue.in_flight(), 2);

        queue.settle(&d1, Acknowledgement::Ack).await.unwrap();
        queue.settle(&d2, Acknowledgement::Reject).await.unwrap();

        assert_eq!(queue.acked(), vec![first]);
        assert_eq!(queue.dead_letters(), vec![d2]);
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_settle_twice_is_an_error() {
        let queue = MemoryQueue::new();
        queue.push_raw("{}");
        let d = queue.next().await.unwrap().unwrap();

        queue.settle(&d, Acknowledgement::Ack).await.unwrap();
        assert!(matches!(
            queue.settle(&d, Acknowledgement::Ack).await,
            Err(IntakeError::UnknownDelivery(_))
        ));
    }
}
