//! Stage workers.
//!
//! Each stage is a [`StageHandler`] driven by a [`StageWorker`]:
//!
//! ```text
//! StageWorker
//!     │
//!     ├─► dequeue(timeout) from the stage queue   (empty → loop)
//!     ├─► handler.handle(job)
//!     │       └─► collaborators, status log, next stage's queue
//!     └─► on error: append "<stage> failed: <error>" to the status log
//! ```

pub mod crawl;
pub mod insight;
pub mod summarize;

pub use crawl::{CrawlOutcome, CrawlStage};
pub use insight::{InsightReport, InsightStage};
pub use summarize::{SummarizeReport, SummarizeStage};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::queue::StageQueue;
use crate::status_log::StatusLog;
use crate::types::job::{Job, JobId, Stage, StagePayload};
use crate::types::status::stage_failed;

/// Default time a worker blocks on an empty queue before looping.
pub const DEFAULT_DEQUEUE_TIMEOUT: Duration = Duration::from_secs(30);

/// The work one stage does for one job.
#[async_trait]
pub trait StageHandler: Send + Sync + 'static {
    type Payload: StagePayload;

    async fn handle(&self, job: &Job<Self::Payload>) -> Result<()>;
}

/// Configuration for a stage worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How long one dequeue call blocks
    pub dequeue_timeout: Duration,
    /// Pause after a failed dequeue before trying again
    pub error_backoff: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            dequeue_timeout: DEFAULT_DEQUEUE_TIMEOUT,
            error_backoff: Duration::from_secs(1),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl WorkerConfig {
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }

    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }
}

/// Long-running loop feeding one stage's queue into its handler.
pub struct StageWorker<H: StageHandler> {
    handler: Arc<H>,
    queue: StageQueue<H::Payload>,
    status: StatusLog,
    config: WorkerConfig,
}

impl<H: StageHandler> StageWorker<H> {
    pub fn new(handler: Arc<H>, queue: StageQueue<H::Payload>, status: StatusLog) -> Self {
        Self {
            handler,
            queue,
            status,
            config: WorkerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn stage(&self) -> Stage {
        H::Payload::STAGE
    }

    pub fn worker_id(&self) -> &str {
        &self.config.worker_id
    }

    /// Wait for one job and process it.
    ///
    /// Returns the id of the processed job, or `None` if the queue stayed
    /// empty for the whole timeout. Handler failures are recorded in the status
    /// log and do not make this call fail; only queue errors do.
    pub async fn run_once(&self) -> Result<Option<JobId>> {
        let Some(job) = self.queue.dequeue(self.config.dequeue_timeout).await? else {
            return Ok(None);
        };
        let stage = self.stage();
        let span = tracing::info_span!("stage", stage = %stage, job_id = %job.job_id);

        async {
            info!("processing job");
            match self.handler.handle(&job).await {
                Ok(()) => debug!("job finished"),
                Err(e) => {
                    warn!(error = %e, fatal = e.is_fatal_to_job(), "job failed");
                    let status = stage_failed(stage, &e);
                    if let Err(e) = self.status.append(job.job_id.as_str(), &status).await {
                        error!(error = %e, "failed to record job failure");
                    }
                }
            }
        }
        .instrument(span)
        .await;

        Ok(Some(job.job_id))
    }

    /// Run until `shutdown` is cancelled. Shutdown is checked between jobs,
    /// so a job in progress always completes.
    pub async fn run(self, shutdown: CancellationToken) {
        let stage = self.stage();
        info!(
            worker_id = %self.config.worker_id,
            stage = %stage,
            queue = self.queue.name(),
            "stage worker starting"
        );

        while !shutdown.is_cancelled() {
            if let Err(e) = self.run_once().await {
                error!(worker_id = %self.config.worker_id, stage = %stage, error = %e, "failed to take job");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.error_backoff) => {}
                }
            }
        }

        info!(worker_id = %self.config.worker_id, stage = %stage, "stage worker stopped");
    }
}
