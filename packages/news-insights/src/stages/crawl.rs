//! Crawl stage: quote page → candidate article URLs → pending news records.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use super::StageHandler;
use crate::cache::{Freshness, StalenessCache};
use crate::clock::Clock;
use crate::dedup::{ArticleIndex, DedupIndex};
use crate::error::{PipelineError, Result};
use crate::queue::StageQueue;
use crate::status_log::StatusLog;
use crate::traits::rate_limit::RateLimiter;
use crate::traits::web::{ArticleLink, PageArchive, PageFetcher, PageKind, QuoteParser};
use crate::types::job::{CrawlRequest, Job, JobId, SummarizeRequest};
use crate::types::news::NewsRecord;
use crate::types::status::news_ready;

pub const DEFAULT_MAX_ARTICLES: usize = 5;

/// What a crawl produced for a ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOutcome {
    pub urls: Vec<String>,
    pub org: Option<String>,
    /// True when a fresh cache entry was reused and nothing was fetched.
    pub from_cache: bool,
    /// New pending records written.
    pub inserted: usize,
}

#[derive(TypedBuilder)]
pub struct CrawlStage {
    cache: StalenessCache,
    articles: ArticleIndex,
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn QuoteParser>,
    archive: Arc<dyn PageArchive>,
    limiter: Arc<dyn RateLimiter>,
    status: StatusLog,
    clock: Arc<dyn Clock>,
    #[builder(default = DEFAULT_MAX_ARTICLES)]
    max_articles: usize,
    /// Where finished crawls are handed on. `None` stops the chain here.
    #[builder(default, setter(strip_option))]
    next: Option<StageQueue<SummarizeRequest>>,
}

impl CrawlStage {
    /// Reuse a fresh download for `ticker` or fetch the quote page and its
    /// new articles, then append `news ready <job_id>`.
    pub async fn find_or_download(&self, ticker: &str, job_id: &JobId) -> Result<CrawlOutcome> {
        info!(ticker = %ticker, "checking previous quote page downloads");

        let outcome = match self.cache.lookup(ticker).await? {
            Freshness::Fresh(entry) => {
                info!(ticker = %ticker, urls = entry.urls.len(), "reusing fresh download");
                CrawlOutcome {
                    urls: entry.urls,
                    org: entry.org,
                    from_cache: true,
                    inserted: 0,
                }
            }
            Freshness::Stale(previous) => {
                if let Some(previous) = previous {
                    debug!(ticker = %ticker, downloaded_at = %previous.created_at, "download expired");
                }
                self.download(ticker).await?
            }
        };

        self.status
            .append(job_id.as_str(), &news_ready(job_id.as_str()))
            .await?;
        Ok(outcome)
    }

    async fn download(&self, ticker: &str) -> Result<CrawlOutcome> {
        let quote_url = self.parser.quote_url(ticker);
        self.limiter.acquire().await;

        let chart_unavailable = |reason: String| PipelineError::ChartUnavailable {
            ticker: ticker.to_string(),
            reason,
        };
        let html = self
            .fetcher
            .fetch(&quote_url)
            .await
            .map_err(|e| chart_unavailable(e.to_string()))?;
        if html.trim().is_empty() {
            return Err(chart_unavailable("empty page".to_string()));
        }
        self.archive.save(ticker, PageKind::Quote, &html).await?;

        let listing = self.parser.parse(&html);
        let candidates = self.candidates(listing.links);
        info!(
            ticker = %ticker,
            org = ?listing.org,
            candidates = candidates.len(),
            "quote page parsed"
        );

        let mut inserted = 0;
        for link in &candidates {
            if self.articles.exists(&link.url).await? {
                debug!(url = %link.url, "article already downloaded");
                continue;
            }
            if self.download_article(ticker, link).await? {
                inserted += 1;
            }
        }

        let urls: Vec<String> = candidates.into_iter().map(|link| link.url).collect();
        self.cache.put(ticker, &urls, listing.org.as_deref()).await?;

        Ok(CrawlOutcome {
            urls,
            org: listing.org,
            from_cache: false,
            inserted,
        })
    }

    /// First `max_articles` distinct links.
    fn candidates(&self, links: Vec<ArticleLink>) -> Vec<ArticleLink> {
        let mut seen = HashSet::new();
        links
            .into_iter()
            .filter(|link| seen.insert(link.url.clone()))
            .take(self.max_articles)
            .collect()
    }

    /// Fetch, archive and record one article. A failed fetch is logged and
    /// skipped so a later crawl can retry it.
    async fn download_article(&self, ticker: &str, link: &ArticleLink) -> Result<bool> {
        self.limiter.acquire().await;
        let html = match self.fetcher.fetch(&link.url).await {
            Ok(html) if !html.trim().is_empty() => html,
            Ok(_) => {
                warn!(url = %link.url, "article page was empty, skipping");
                return Ok(false);
            }
            Err(e) => {
                warn!(url = %link.url, error = %e, "failed to fetch article, skipping");
                return Ok(false);
            }
        };

        let file_path = self.archive.save(ticker, PageKind::News, &html).await?;
        let record = NewsRecord::pending(&link.url, &link.title, file_path, self.clock.now());
        let inserted = self.articles.mark(&link.url, record).await?.is_some();
        if inserted {
            info!(url = %link.url, "news record created");
        }
        Ok(inserted)
    }
}

#[async_trait]
impl StageHandler for CrawlStage {
    type Payload = CrawlRequest;

    async fn handle(&self, job: &Job<CrawlRequest>) -> Result<()> {
        let ticker = &job.payload.ticker;
        let outcome = self.find_or_download(ticker, &job.job_id).await?;

        if let Some(next) = &self.next {
            let request = SummarizeRequest {
                urls: outcome.urls,
                ticker: ticker.clone(),
                org: outcome.org,
            };
            next.enqueue(&Job::new(job.job_id.clone(), request)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::queue::MemoryQueue;
    use crate::rate_limit::Unlimited;
    use crate::stores::MemoryStore;
    use crate::testing::{MockFetcher, StaticQuoteParser};
    use crate::traits::store::{ChartCache, NewsStore};
    use crate::types::status::StatusKind;
    use crate::web::MemoryArchive;
    use chrono::{Duration, Utc};

    struct Harness {
        stage: CrawlStage,
        store: Arc<MemoryStore>,
        fetcher: Arc<MockFetcher>,
        clock: Arc<ManualClock>,
        status: StatusLog,
        next: StageQueue<SummarizeRequest>,
    }

    fn links(n: usize) -> Vec<ArticleLink> {
        (0..n)
            .map(|i| ArticleLink::new(format!("https://news.example.com/{i}"), format!("Story {i}")))
            .collect()
    }

    fn harness(parser: StaticQuoteParser, fetcher: MockFetcher) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let fetcher = Arc::new(fetcher);
        let status = StatusLog::new(store.clone(), clock.clone());
        let next = StageQueue::new(Arc::new(MemoryQueue::new()));
        let stage = CrawlStage::builder()
            .cache(StalenessCache::new(store.clone(), clock.clone()))
            .articles(ArticleIndex::new(store.clone()))
            .fetcher(fetcher.clone())
            .parser(Arc::new(parser))
            .archive(Arc::new(MemoryArchive::new()))
            .limiter(Arc::new(Unlimited))
            .status(status.clone())
            .clock(clock.clone())
            .next(next.clone())
            .build();
        Harness {
            stage,
            store,
            fetcher,
            clock,
            status,
            next,
        }
    }

    fn full_site(parser: &StaticQuoteParser, links: &[ArticleLink]) -> MockFetcher {
        let mut fetcher = MockFetcher::new().with_page(parser.quote_url("AAPL"), "<html>quote</html>");
        for link in links {
            fetcher = fetcher.with_page(&link.url, format!("<main>{}</main>", link.title));
        }
        fetcher
    }

    #[tokio::test]
    async fn test_aapl_crawl_records_pending_articles() {
        let links = links(7);
        let parser = StaticQuoteParser::new(Some("Apple Inc."), links.clone());
        let h = harness(parser.clone(), full_site(&parser, &links));
        let job_id = JobId::new("u@s@AAPL@00000001");

        let outcome = h.stage.find_or_download("AAPL", &job_id).await.unwrap();

        assert!(!outcome.from_cache);
        assert_eq!(outcome.urls.len(), DEFAULT_MAX_ARTICLES);
        assert_eq!(outcome.inserted, DEFAULT_MAX_ARTICLES);
        assert_eq!(outcome.org.as_deref(), Some("Apple Inc."));
        assert_eq!(h.fetcher.calls_for(&parser.quote_url("AAPL")), 1);

        for url in &outcome.urls {
            let record = h.store.get_record(url).await.unwrap().unwrap();
            assert!(record.is_pending());
        }
        assert_eq!(h.store.entries("AAPL").await.unwrap().len(), 1);

        let status = h.status.resolve(job_id.as_str()).await.unwrap();
        assert_eq!(status.text, "news ready u@s@AAPL@00000001");
        assert_eq!(status.kind, StatusKind::InProgress);
    }

    #[tokio::test]
    async fn test_repeat_crawl_within_ttl_reuses_cache() {
        let links = links(3);
        let parser = StaticQuoteParser::new(None, links.clone());
        let h = harness(parser.clone(), full_site(&parser, &links));

        let first = h.stage.find_or_download("AAPL", &JobId::new("j1")).await.unwrap();
        h.clock.advance(Duration::hours(2));
        let second = h.stage.find_or_download("AAPL", &JobId::new("j2")).await.unwrap();

        assert!(second.from_cache);
        assert_eq!(second.urls, first.urls);
        assert_eq!(h.fetcher.calls_for(&parser.quote_url("AAPL")), 1);
        assert_eq!(h.store.entries("AAPL").await.unwrap().len(), 1);
        assert_eq!(
            h.status.resolve("j2").await.unwrap().text,
            "news ready j2"
        );
    }

    #[tokio::test]
    async fn test_expired_cache_refetches_but_skips_known_articles() {
        let links = links(2);
        let parser = StaticQuoteParser::new(None, links.clone());
        let h = harness(parser.clone(), full_site(&parser, &links));

        h.stage.find_or_download("AAPL", &JobId::new("j1")).await.unwrap();
        h.clock.advance(Duration::hours(24));
        let again = h.stage.find_or_download("AAPL", &JobId::new("j2")).await.unwrap();

        assert!(!again.from_cache);
        assert_eq!(again.inserted, 0);
        assert_eq!(h.fetcher.calls_for(&parser.quote_url("AAPL")), 2);
        assert_eq!(h.fetcher.calls_for(&links[0].url), 1);
        assert_eq!(h.store.entries("AAPL").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_article_fetch_failure_is_skipped() {
        let links = links(3);
        let parser = StaticQuoteParser::new(None, links.clone());
        let fetcher = full_site(&parser, &links).with_failure(&links[1].url);
        let h = harness(parser, fetcher);

        let outcome = h.stage.find_or_download("AAPL", &JobId::new("j1")).await.unwrap();

        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.urls.len(), 3);
        assert!(h.store.get_record(&links[1].url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_quote_page_is_fatal() {
        let parser = StaticQuoteParser::new(None, links(2));
        let h = harness(parser, MockFetcher::new());

        let err = h
            .stage
            .find_or_download("AAPL", &JobId::new("j1"))
            .await
            .unwrap_err();

        assert!(err.is_fatal_to_job());
        assert_eq!(h.store.news_count(), 0);
        assert_eq!(h.store.chart_entry_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_links_are_collapsed() {
        let mut links = links(2);
        links.push(links[0].clone());
        let parser = StaticQuoteParser::new(None, links.clone());
        let h = harness(parser.clone(), full_site(&parser, &links));

        let outcome = h.stage.find_or_download("AAPL", &JobId::new("j1")).await.unwrap();
        assert_eq!(outcome.urls.len(), 2);
    }

    #[tokio::test]
    async fn test_handle_enqueues_summarize_job() {
        let links = links(2);
        let parser = StaticQuoteParser::new(Some("Apple Inc."), links.clone());
        let h = harness(parser.clone(), full_site(&parser, &links));
        let job = Job::new(JobId::new("j1"), CrawlRequest { ticker: "AAPL".into() });

        h.stage.handle(&job).await.unwrap();

        let next = h
            .next
            .dequeue(std::time::Duration::from_millis(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.job_id, job.job_id);
        assert_eq!(next.payload.ticker, "AAPL");
        assert_eq!(next.payload.urls.len(), 2);
        assert_eq!(next.payload.org.as_deref(), Some("Apple Inc."));
    }
}
