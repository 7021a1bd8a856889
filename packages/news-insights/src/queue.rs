//! Stage queues.
//!
//! [`StageQueue`] is the typed view a stage uses: it serializes [`Job`]s to
//! JSON and moves them through any [`QueueBackend`]. [`MemoryQueue`] is the
//! in-process backend.

use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::Result;
use crate::traits::queue::QueueBackend;
use crate::types::job::{Job, JobId, StagePayload};

/// Typed handle on one named queue.
pub struct StageQueue<P> {
    backend: Arc<dyn QueueBackend>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> Clone for StageQueue<P> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            _payload: PhantomData,
        }
    }
}

impl<P: StagePayload> StageQueue<P> {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self {
            backend,
            _payload: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        P::QUEUE
    }

    pub async fn enqueue(&self, job: &Job<P>) -> Result<JobId> {
        let message = serde_json::to_string(job)?;
        self.backend.push(P::QUEUE, message).await?;
        info!(job_id = %job.job_id, queue = P::QUEUE, "job enqueued");
        Ok(job.job_id.clone())
    }

    /// Wait up to `timeout` for the next job.
    ///
    /// A message that fails to decode has already been removed from the
    /// queue; the error is returned and the message is gone.
    pub async fn dequeue(&self, timeout: Duration) -> Result<Option<Job<P>>> {
        let Some(message) = self.backend.pop(P::QUEUE, timeout).await? else {
            return Ok(None);
        };
        let job: Job<P> = serde_json::from_str(&message)?;
        debug!(job_id = %job.job_id, queue = P::QUEUE, "job dequeued");
        Ok(Some(job))
    }

    pub async fn len(&self) -> Result<usize> {
        self.backend.len(P::QUEUE).await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// In-process queue backend.
#[derive(Default)]
pub struct MemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    pushed: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn try_pop(&self, queue: &str) -> Option<String> {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(queue)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl QueueBackend for MemoryQueue {
    async fn push(&self, queue: &str, message: String) -> Result<()> {
        self.queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(queue.to_string())
            .or_default()
            .push_back(message);
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a push in between is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_pop(queue) {
                return Ok(Some(message));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(self.try_pop(queue));
            }
        }
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        Ok(self
            .queues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(queue)
            .map_or(0, VecDeque::len))
    }
}
