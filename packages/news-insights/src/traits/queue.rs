//! Queue transport.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// Named FIFO queues of serialized jobs.
///
/// Push never blocks. Pop waits up to `timeout` and hands each message to
/// exactly one caller; there is no acknowledgement or redelivery.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    async fn push(&self, queue: &str, message: String) -> Result<()>;

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>>;

    async fn len(&self, queue: &str) -> Result<usize>;
}
