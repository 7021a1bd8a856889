use async_trait::async_trait;

/// Paces outbound calls. `acquire` returns once the caller may proceed.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn acquire(&self);
}
