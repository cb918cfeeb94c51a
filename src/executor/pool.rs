//! Fixed-size worker pool
//!
//! `pool_size` workers pull boxed tasks from a bounded queue. Submitting to
//! a full queue waits until a slot frees up. The pool is shared by every
//! job the process runs and is the only backpressure in the pipeline.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use super::panic_message;

/// Worker pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool is shut down")]
    Closed,

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was dropped before it completed")]
    Dropped,
}

type Task = BoxFuture<'static, ()>;

/// Bounded-concurrency task pool
pub struct WorkerPool {
    sender: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
    size: usize,
}

impl WorkerPool {
    /// Start `size` workers behind a queue holding `queue_capacity` tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(size: usize, queue_capacity: usize) -> Self {
        let size = size.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel::<Task>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| {
                let receiver = receiver.clone();
                tokio::spawn(async move {
                    loop {
                        let task = { receiver.lock().await.recv().await };
                        match task {
                            Some(task) => task.await,
                            None => break,
                        }
                    }
                    debug!("Pool worker {} stopped", id);
                })
            })
            .collect();

        debug!(
            "Started worker pool with {} workers (queue capacity {})",
            size, queue_capacity
        );

        Self {
            sender,
            workers,
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a task, waiting while the queue is full
    pub async fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let wrapped = async move {
            let outcome = AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .map_err(panic_message);
            let _ = tx.send(outcome);
        }
        .boxed();

        self.sender
            .send(wrapped)
            .await
            .map_err(|_| PoolError::Closed)?;

        Ok(TaskHandle { rx })
    }

    /// Stop accepting work and wait for queued tasks to drain
    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Completion handle for a submitted task
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, String>>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task to finish
    pub async fn join(self) -> Result<T, PoolError> {
        match self.rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(PoolError::Panicked(message)),
            Err(_) => Err(PoolError::Dropped),
        }
    }
}
