//! Bounded-concurrency scheduler.
//!
//! Keeps up to `limit` tasks running at once on a `JoinSet`; when one settles
//! the next queued task is started, in submission order, until the queue is
//! empty. A task's result is opaque here: one task failing never affects its
//! siblings. Once the run's cancellation token fires, queued tasks are dropped
//! without ever being started; running tasks are expected to observe the same
//! token and wind down on their own.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

type QueuedTask<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

pub struct BoundedScheduler<T> {
    limit: usize,
    queue: VecDeque<QueuedTask<T>>,
    running: JoinSet<T>,
    cancel: CancellationToken,
}

impl<T: Send + 'static> BoundedScheduler<T> {
    /// `limit` is clamped to at least 1.
    pub fn new(limit: usize, cancel: CancellationToken) -> Self {
        Self {
            limit: limit.max(1),
            queue: VecDeque::new(),
            running: JoinSet::new(),
            cancel,
        }
    }

    /// Queues a task; it starts immediately if a slot is free. Must be called
    /// from within a tokio runtime.
    pub fn admit<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.queue.push_back(Box::pin(task));
        self.refill();
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.running.is_empty()
    }

    fn refill(&mut self) {
        if self.cancel.is_cancelled() {
            if !self.queue.is_empty() {
                tracing::debug!(dropped = self.queue.len(), "cancelled; discarding queued tasks");
                self.queue.clear();
            }
            return;
        }
        while self.running.len() < self.limit {
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            self.running.spawn(task);
        }
    }

    /// Waits for the next task to settle, starting queued tasks as slots free.
    /// Returns `None` once nothing is queued or running. A `JoinError` means
    /// the task panicked.
    pub async fn next_settled(&mut self) -> Option<Result<T, JoinError>> {
        self.refill();
        self.running.join_next().await
    }

    /// Runs until idle, handing each settlement to `on_settle` in settlement order.
    pub async fn drain<F>(&mut self, mut on_settle: F)
    where
        F: FnMut(Result<T, JoinError>),
    {
        while let Some(settled) = self.next_settled().await {
            on_settle(settled);
        }
    }
}
