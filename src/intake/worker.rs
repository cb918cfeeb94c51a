//! Job consumer loop

use futures::future::join_all;
use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{Acknowledgement, Delivery, IntakeError, JobSource};
use crate::executor::JobRunner;
use crate::models::Job;
use crate::reporter::ReliableReporter;

/// Counters returned when the consumers stop
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub acked: usize,
    pub rejected: usize,
}

impl WorkerStats {
    fn record(&mut self, ack: Acknowledgement) {
        self.processed += 1;
        match ack {
            Acknowledgement::Ack => self.acked += 1,
            Acknowledgement::Reject => self.rejected += 1,
        }
    }
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.acked += other.acked;
        self.rejected += other.rejected;
    }
}

/// Consumes jobs from a [`JobSource`] with a fixed number of consumer tasks
#[derive(Clone)]
pub struct Worker {
    source: Arc<dyn JobSource>,
    runner: JobRunner,
    reporter: ReliableReporter,
    consumers: usize,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(source: Arc<dyn JobSource>, runner: JobRunner, reporter: ReliableReporter) -> Self {
        Self {
            source,
            runner,
            reporter,
            consumers: 1,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn consumers(mut self, consumers: usize) -> Self {
        self.consumers = consumers.max(1);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Run one message through the pipeline and decide how to settle it
    pub async fn process(&self, delivery: &Delivery) -> Acknowledgement {
        let job = match Job::from_payload(&delivery.payload) {
            Ok(job) => job,
            Err(e) => {
                let err = IntakeError::Malformed {
                    id: delivery.id.clone(),
                    reason: e.to_string(),
                };
                error!("{}", err);
                return Acknowledgement::Reject;
            }
        };

        info!("Received {}", job);
        let result = self.runner.run(&job).await;
        let outcome = self.reporter.report(&job.run_id, &result).await;

        if outcome.is_delivered() {
            Acknowledgement::Ack
        } else {
            error!("Run {} {}", job.run_id, outcome);
            Acknowledgement::Reject
        }
    }

    /// Consume until `shutdown` flips to true
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> WorkerStats {
        self.spawn_consumers(shutdown, false).await
    }

    /// Consume until the source has nothing pending
    pub async fn drain(&self) -> WorkerStats {
        let (_tx, rx) = watch::channel(false);
        self.spawn_consumers(rx, true).await
    }

    async fn spawn_consumers(&self, shutdown: watch::Receiver<bool>, once: bool) -> WorkerStats {
        info!("Starting {} consumer(s)", self.consumers);

        let handles: Vec<_> = (1..=self.consumers)
            .map(|id| {
                let worker = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { worker.consume(id, shutdown, once).await })
            })
            .collect();

        let mut total = WorkerStats::default();
        for joined in join_all(handles).await {
            match joined {
                Ok(stats) => total += stats,
                Err(e) => error!("Consumer task failed: {}", e),
            }
        }

        info!(
            "Consumers stopped: {} processed, {} acked, {} dead-lettered",
            total.processed, total.acked, total.rejected
        );
        total
    }

    async fn consume(
        &self,
        id: usize,
        mut shutdown: watch::Receiver<bool>,
        once: bool,
    ) -> WorkerStats {
        let mut stats = WorkerStats::default();

        loop {
            if *shutdown.borrow() {
                debug!("Consumer {} shutting down", id);
                break;
            }

            match self.source.next().await {
                Ok(Some(delivery)) => {
                    let ack = self.process(&delivery).await;
                    if let Err(e) = self.source.settle(&delivery, ack).await {
                        error!("Failed to settle {}: {}", delivery.id, e);
                    }
                    stats.record(ack);
                    continue;
                }
                Ok(None) if once => break,
                Ok(None) => {}
                Err(e) => {
                    warn!("Consumer {} could not fetch a job: {}", id, e);
                    if once {
                        break;
                    }
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ParallelDispatcher, RetryingExecutor, WorkerPool};
    use crate::intake::MemoryQueue;
    use crate::reporter::{DeliveryError, RunStatusClient, RunUpdate};
    use crate::suite::testing::ScriptedUnit;
    use crate::suite::Registry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingClient {
        accept: bool,
        updates: Mutex<Vec<(String, RunUpdate)>>,
    }

    impl RecordingClient {
        fn new(accept: bool) -> Arc<Self> {
            Arc::new(Self {
                accept,
                updates: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RunStatusClient for RecordingClient {
        async fn update_run(&self, run_id: &str, update: &RunUpdate) -> Result<(), DeliveryError> {
            self.updates
                .lock()
                .unwrap()
                .push((run_id.to_string(), update.clone()));
            if self.accept {
                Ok(())
            } else {
                Err(DeliveryError::Status {
                    status: 500,
                    body: "down".to_string(),
                })
            }
        }
    }

    fn worker(queue: Arc<MemoryQueue>, client: Arc<RecordingClient>) -> Worker {
        let registry = Registry::builder()
            .register(ScriptedUnit::passing("T1", &["smoke"]))
            .register(ScriptedUnit::failing("T3", &["regression"]))
            .build();
        let dispatcher = ParallelDispatcher::new(
            Arc::new(WorkerPool::new(2, 4)),
            Arc::new(RetryingExecutor::new(2)),
        );
        let runner = JobRunner::new(Arc::new(registry), dispatcher);
        let reporter =
            ReliableReporter::new(client, 3).with_retry_delay(Duration::from_millis(1));

        Worker::new(queue, runner, reporter)
            .consumers(2)
            .poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_drain_acks_delivered_jobs() {
        let queue = Arc::new(MemoryQueue::new());
        queue.push(&Job::new("r1", "dev", "smoke")).unwrap();
        queue.push(&Job::new("r2", "dev", "regression")).unwrap();
        let client = RecordingClient::new(true);

        let stats = worker(queue.clone(), client.clone()).drain().await;

        assert_eq!(stats, WorkerStats { processed: 2, acked: 2, rejected: 0 });
        assert_eq!(queue.acked().len(), 2);

        let mut updates = client.updates.lock().unwrap().clone();
        updates.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(updates[0].1.status, crate::models::RunStatus::Completed);
        assert_eq!(updates[1].1.status, crate::models::RunStatus::Failed);
        assert_eq!(updates[1].1.failed_test_count, 1);
    }

    #[tokio::test]
    async fn test_undeliverable_result_is_dead_lettered() {
        let queue = Arc::new(MemoryQueue::new());
        queue.push(&Job::new("r1", "dev", "smoke")).unwrap();
        let client = RecordingClient::new(false);

        let stats = worker(queue.clone(), client.clone()).drain().await;

        assert_eq!(stats.rejected, 1);
        assert_eq!(queue.dead_letters().len(), 1);
        assert_eq!(client.updates.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_payload_rejected_without_running() {
        let queue = Arc::new(MemoryQueue::new());
        queue.push_raw("{\"environment\": \"dev\"");
        let client = RecordingClient::new(true);

        let stats = worker(queue.clone(), client.clone()).drain().await;

        assert_eq!(stats.rejected, 1);
        assert_eq!(queue.dead_letters().len(), 1);
        assert!(client.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let queue = Arc::new(MemoryQueue::new());
        let client = RecordingClient::new(true);
        let worker = worker(queue.clone(), client);
        let (tx, rx) = watch::channel(false);

        let running = tokio::spawn(async move { worker.run(rx).await });
        queue.push(&Job::new("r1", "dev", "smoke")).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();

        let stats = running.await.unwrap();
        assert_eq!(stats.acked, 1);
        assert_eq!(queue.pending(), 0);
    }
}
