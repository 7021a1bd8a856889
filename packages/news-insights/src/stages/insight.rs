//! Insight stage: summarized articles → persisted fragments.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use super::StageHandler;
use crate::ai::prompts::DEFAULT_INSIGHT_PROMPT;
use crate::clock::Clock;
use crate::dedup::{DedupIndex, FragmentIndex};
use crate::error::Result;
use crate::status_log::StatusLog;
use crate::traits::ai::InsightExtractor;
use crate::traits::store::NewsStore;
use crate::types::fragment::{Fragment, FragmentKey, InsightOutcome, InsightQuery};
use crate::types::job::{InsightRequest, Job};

/// Articles are cut to this many characters before extraction.
pub const DEFAULT_CONTENT_LIMIT: usize = 8000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsightReport {
    /// URLs already turned into fragments for this ticker
    pub already_done: usize,
    pub stored: usize,
    /// Extractor said the article does not concern the ticker
    pub unrelated: usize,
    /// Missing record or content still pending
    pub skipped: usize,
    pub failed: usize,
}

enum Step {
    Stored,
    Unrelated,
    Skipped,
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(TypedBuilder)]
pub struct InsightStage {
    news: Arc<dyn NewsStore>,
    fragments: FragmentIndex,
    extractor: Arc<dyn InsightExtractor>,
    status: StatusLog,
    clock: Arc<dyn Clock>,
    #[builder(default = DEFAULT_INSIGHT_PROMPT.to_string(), setter(into))]
    instructions: String,
    #[builder(default = DEFAULT_CONTENT_LIMIT)]
    content_limit: usize,
}

impl InsightStage {
    /// Extract insights for every URL not yet done for `ticker`, then append
    /// the terminal status. The terminal status is written even when there
    /// is nothing to do.
    pub async fn process_job(
        &self,
        job_id: &str,
        org: Option<&str>,
        ticker: &str,
        urls: &[String],
    ) -> Result<InsightReport> {
        let mut report = InsightReport::default();

        let mut new_urls = Vec::new();
        for url in urls {
            if self.fragments.exists(&FragmentKey::new(url, ticker)).await? {
                report.already_done += 1;
            } else {
                new_urls.push(url);
            }
        }

        if new_urls.is_empty() {
            info!(job_id = %job_id, ticker = %ticker, "no new articles for insight extraction");
        }

        for url in new_urls {
            match self.extract_one(org, ticker, url).await {
                Ok(Step::Stored) => report.stored += 1,
                Ok(Step::Unrelated) => report.unrelated += 1,
                Ok(Step::Skipped) => report.skipped += 1,
                Err(e) if e.is_transient() => return Err(e),
                Err(e) => {
                    warn!(url = %url, error = %e, "insight extraction failed, skipping");
                    report.failed += 1;
                }
            }
        }

        self.status
            .append(job_id, self.status.terminal_marker())
            .await?;
        info!(
            job_id = %job_id,
            ticker = %ticker,
            stored = report.stored,
            unrelated = report.unrelated,
            "insights ready"
        );
        Ok(report)
    }

    async fn extract_one(&self, org: Option<&str>, ticker: &str, url: &str) -> Result<Step> {
        let Some(record) = self.news.get_record(url).await? else {
            debug!(url = %url, "no news record");
            return Ok(Step::Skipped);
        };
        if record.is_pending() || record.content.trim().is_empty() {
            debug!(url = %url, "article not summarized yet");
            return Ok(Step::Skipped);
        }

        let query = InsightQuery {
            org: org.map(str::to_string),
            ticker: ticker.to_string(),
            title: record.title.clone(),
            publish_date: record.publish_date.clone(),
            content: truncate_chars(&record.content, self.content_limit).to_string(),
        };

        match self.extractor.extract(&self.instructions, &query).await? {
            InsightOutcome::Unrelated => {
                debug!(url = %url, ticker = %ticker, "article unrelated to ticker");
                Ok(Step::Unrelated)
            }
            InsightOutcome::Related(insight) => {
                let key = FragmentKey::new(url, ticker);
                let fragment = Fragment::new(
                    key.clone(),
                    query.org,
                    record.title,
                    insight,
                    self.clock.now(),
                );
                self.fragments.mark(&key, fragment).await?;
                info!(url = %url, ticker = %ticker, "fragment stored");
                Ok(Step::Stored)
            }
        }
    }
}

#[async_trait]
impl StageHandler for InsightStage {
    type Payload = InsightRequest;

    async fn handle(&self, job: &Job<InsightRequest>) -> Result<()> {
        let request = &job.payload;
        self.process_job(
            job.job_id.as_str(),
            request.org.as_deref(),
            &request.ticker,
            &request.urls,
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::stores::MemoryStore;
    use crate::testing::MockInsightExtractor;
    use crate::traits::store::FragmentStore;
    use crate::types::fragment::Insight;
    use crate::types::news::NewsRecord;
    use crate::types::status::{StatusKind, INSIGHTS_READY};
    use chrono::Utc;

    struct Harness {
        stage: InsightStage,
        store: Arc<MemoryStore>,
        extractor: Arc<MockInsightExtractor>,
        status: StatusLog,
    }

    fn harness(extractor: MockInsightExtractor) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let extractor = Arc::new(extractor);
        let status = StatusLog::new(store.clone(), clock.clone());
        let stage = InsightStage::builder()
            .news(store.clone())
            .fragments(FragmentIndex::new(store.clone()))
            .extractor(extractor.clone())
            .status(status.clone())
            .clock(clock)
            .build();
        Harness {
            stage,
            store,
            extractor,
            status,
        }
    }

    fn summarized(url: &str, title: &str, content: &str) -> NewsRecord {
        let mut record = NewsRecord::pending(url, title, "path", Utc::now());
        record.content = content.to_string();
        record.summary = "summary".to_string();
        record.publish_date = "2025-02-03".to_string();
        record
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars(&"é".repeat(9000), 8000).chars().count(), 8000);
    }

    #[tokio::test]
    async fn test_only_unmarked_urls_are_extracted() {
        let h = harness(MockInsightExtractor::new());
        let done = summarized("https://n.example.com/done", "Done", "old text");
        let fresh = summarized("https://n.example.com/new", "New", "new text");
        h.store.seed_record(done.clone());
        h.store.seed_record(fresh.clone());
        let existing = Fragment::new(
            FragmentKey::new(&done.url, "AAPL"),
            None,
            "Done",
            Insight::default(),
            Utc::now(),
        );
        h.store.insert_fragment(&existing).await.unwrap();

        let urls = vec![done.url.clone(), fresh.url.clone()];
        let report = h.stage.process_job("job", Some("Apple Inc."), "AAPL", &urls).await.unwrap();

        assert_eq!(report.already_done, 1);
        assert_eq!(report.stored, 1);
        let calls = h.extractor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].title, "New");
        assert_eq!(calls[0].org.as_deref(), Some("Apple Inc."));
        assert_eq!(calls[0].publish_date, "2025-02-03");

        let fragments = h.store.fragments_for_ticker("AAPL", 10).await.unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(h.status.resolve("job").await.unwrap().kind, StatusKind::Ready);
    }

    #[tokio::test]
    async fn test_no_relation_stores_nothing_but_finishes() {
        let h = harness(MockInsightExtractor::new().unrelated("Off topic"));
        let record = summarized("https://n.example.com/x", "Off topic", "gardening tips");
        h.store.seed_record(record.clone());

        let report = h
            .stage
            .process_job("job", None, "AAPL", &[record.url.clone()])
            .await
            .unwrap();

        assert_eq!(report.unrelated, 1);
        assert_eq!(h.store.fragment_count(), 0);
        let status = h.status.resolve("job").await.unwrap();
        assert_eq!(status.text, INSIGHTS_READY);
    }

    #[tokio::test]
    async fn test_nothing_new_still_records_terminal_status() {
        let h = harness(MockInsightExtractor::new());
        let report = h.stage.process_job("job", None, "AAPL", &[]).await.unwrap();
        assert_eq!(report, InsightReport::default());
        assert_eq!(h.status.resolve("job").await.unwrap().kind, StatusKind::Ready);
    }

    #[tokio::test]
    async fn test_pending_missing_and_failing_articles_are_skipped() {
        let h = harness(MockInsightExtractor::new().failing_on("Broken"));
        let pending = NewsRecord::pending("https://n.example.com/p", "Pending", "path", Utc::now());
        h.store.seed_record(pending.clone());
        let broken = summarized("https://n.example.com/b", "Broken", "text");
        h.store.seed_record(broken.clone());

        let urls = vec![
            pending.url.clone(),
            broken.url.clone(),
            "https://n.example.com/missing".to_string(),
        ];
        let report = h.stage.process_job("job", None, "AAPL", &urls).await.unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(h.store.fragment_count(), 0);
        assert_eq!(h.status.resolve("job").await.unwrap().kind, StatusKind::Ready);
    }

    #[tokio::test]
    async fn test_content_is_truncated() {
        let h = harness(MockInsightExtractor::new());
        let record = summarized("https://n.example.com/long", "Long", &"a".repeat(10_000));
        h.store.seed_record(record.clone());

        h.stage
            .process_job("job", None, "AAPL", &[record.url.clone()])
            .await
            .unwrap();

        assert_eq!(h.extractor.calls()[0].content.len(), DEFAULT_CONTENT_LIMIT);
    }
}
