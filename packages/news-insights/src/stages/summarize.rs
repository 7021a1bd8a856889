//! Summarize stage: pending news records → article text, summary and date.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use super::StageHandler;
use crate::ai::prompts::DEFAULT_SUMMARY_PROMPT;
use crate::error::{PipelineError, Result};
use crate::queue::StageQueue;
use crate::status_log::StatusLog;
use crate::traits::ai::Summarizer;
use crate::traits::rate_limit::RateLimiter;
use crate::traits::store::NewsStore;
use crate::traits::web::{ContentExtractor, PageArchive};
use crate::types::job::{InsightRequest, Job, SummarizeRequest};
use crate::types::news::{ArticleUpdate, NewsRecord};
use crate::types::status::SUMMARIES_READY;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummarizeReport {
    pub summarized: usize,
    /// Records that already had content
    pub already_done: usize,
    /// URLs with no news record
    pub missing: usize,
    /// Articles left pending after an error
    pub failed: usize,
}

#[derive(TypedBuilder)]
pub struct SummarizeStage {
    news: Arc<dyn NewsStore>,
    archive: Arc<dyn PageArchive>,
    extractor: Arc<dyn ContentExtractor>,
    summarizer: Arc<dyn Summarizer>,
    limiter: Arc<dyn RateLimiter>,
    status: StatusLog,
    #[builder(default = DEFAULT_SUMMARY_PROMPT.to_string(), setter(into))]
    instructions: String,
    #[builder(default, setter(strip_option))]
    next: Option<StageQueue<InsightRequest>>,
}

impl SummarizeStage {
    /// Summarize every pending article among `urls`, one at a time, then
    /// append `summaries ready`.
    pub async fn batch_process(&self, urls: &[String], job_id: &str) -> Result<SummarizeReport> {
        let mut report = SummarizeReport::default();
        let mut pending = Vec::new();

        for (url, record) in self.news.get_records(urls).await? {
            match record {
                None => {
                    debug!(url = %url, "no news record, skipping");
                    report.missing += 1;
                }
                Some(record) if record.is_pending() => pending.push(record),
                Some(_) => report.already_done += 1,
            }
        }

        info!(job_id = %job_id, pending = pending.len(), "summarizing articles");
        for record in &pending {
            self.limiter.acquire().await;
            match self.summarize_article(record).await {
                Ok(()) => report.summarized += 1,
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    warn!(url = %record.url, error = %e, "failed to summarize article, leaving it pending");
                    report.failed += 1;
                }
            }
        }

        self.status.append(job_id, SUMMARIES_READY).await?;
        info!(
            job_id = %job_id,
            summarized = report.summarized,
            failed = report.failed,
            "summaries ready"
        );
        Ok(report)
    }

    async fn summarize_article(&self, record: &NewsRecord) -> Result<()> {
        let html = self.archive.load(&record.file_path).await?;
        let content = self
            .extractor
            .extract(&html)
            .ok_or_else(|| PipelineError::ContentUnavailable {
                url: record.url.clone(),
            })?;

        let summary = self.summarizer.summarize(&self.instructions, &content).await?;
        let update = ArticleUpdate {
            content,
            summary: summary.summary,
            publish_date: summary.publish_date,
        };

        if !self.news.update_article(&record.url, &update).await? {
            return Err(PipelineError::RecordNotFound {
                url: record.url.clone(),
            });
        }
        debug!(url = %record.url, "article summarized");
        Ok(())
    }
}

#[async_trait]
impl StageHandler for SummarizeStage {
    type Payload = SummarizeRequest;

    async fn handle(&self, job: &Job<SummarizeRequest>) -> Result<()> {
        self.batch_process(&job.payload.urls, job.job_id.as_str())
            .await?;

        if let Some(next) = &self.next {
            next.enqueue(&Job::new(job.job_id.clone(), job.payload.clone().into()))
                .await?;
        }
        Ok(())
    }
}
