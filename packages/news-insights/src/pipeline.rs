//! Client-facing side of the pipeline: submission and status polling.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::Result;
use crate::queue::StageQueue;
use crate::status_log::StatusLog;
use crate::traits::queue::QueueBackend;
use crate::traits::store::FragmentStore;
use crate::types::fragment::Fragment;
use crate::types::job::{normalize_ticker, CrawlRequest, Job, JobId, Session};
use crate::types::status::{JobStatus, StatusKind, SUBMITTED};

pub const DEFAULT_FRAGMENT_LIMIT: usize = 10;

/// How a client waits for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready(JobStatus),
    Failed(JobStatus),
    /// Attempts ran out. The job keeps running.
    Busy { last: JobStatus },
}

/// A submitted job and the queue depth it landed behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: JobId,
    pub ticker: String,
    pub queue_position: usize,
}

#[derive(Clone)]
pub struct Pipeline {
    status: StatusLog,
    crawl_queue: StageQueue<CrawlRequest>,
    fragments: Arc<dyn FragmentStore>,
}

impl Pipeline {
    pub fn new(
        status: StatusLog,
        queues: Arc<dyn QueueBackend>,
        fragments: Arc<dyn FragmentStore>,
    ) -> Self {
        Self {
            status,
            crawl_queue: StageQueue::new(queues),
            fragments,
        }
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.status
    }

    /// Validate the ticker, record `submitted` and queue the crawl.
    pub async fn submit(&self, session: &Session, ticker: &str) -> Result<Submission> {
        let ticker = normalize_ticker(ticker)?;
        let job_id = JobId::generate(session, &ticker);

        self.status.append(job_id.as_str(), SUBMITTED).await?;
        self.crawl_queue
            .enqueue(&Job::new(
                job_id.clone(),
                CrawlRequest {
                    ticker: ticker.clone(),
                },
            ))
            .await?;
        let queue_position = self.crawl_queue.len().await?;

        info!(job_id = %job_id, ticker = %ticker, queue_position, "job submitted");
        Ok(Submission {
            job_id,
            ticker,
            queue_position,
        })
    }

    pub async fn status(&self, job_id: &str) -> Result<JobStatus> {
        self.status.resolve(job_id).await
    }

    /// Resolve the job's status up to `max_attempts` times, `interval` apart,
    /// stopping early on ready or failed.
    pub async fn poll(&self, job_id: &str, config: PollConfig) -> Result<PollOutcome> {
        let mut last = JobStatus::unknown();
        for attempt in 1..=config.max_attempts {
            last = self.status.resolve(job_id).await?;
            debug!(job_id = %job_id, attempt, status = %last.text, "polled job status");
            match last.kind {
                StatusKind::Ready => return Ok(PollOutcome::Ready(last)),
                StatusKind::Failed => return Ok(PollOutcome::Failed(last)),
                _ => {}
            }
            if attempt < config.max_attempts {
                tokio::time::sleep(config.interval).await;
            }
        }
        info!(job_id = %job_id, attempts = config.max_attempts, "job still running, giving up");
        Ok(PollOutcome::Busy { last })
    }

    /// Newest fragments for a ticker.
    pub async fn fragments(&self, ticker: &str, limit: usize) -> Result<Vec<Fragment>> {
        let ticker = normalize_ticker(ticker)?;
        self.fragments.fragments_for_ticker(&ticker, limit).await
    }

    pub async fn queue_depth(&self) -> Result<usize> {
        self.crawl_queue.len().await
    }
}
