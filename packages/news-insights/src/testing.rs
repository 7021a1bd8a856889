//! Testing utilities including mock implementations.
//!
//! These let the stage workers run end to end without network or LLM calls.
//! Every mock records its calls for assertions.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use crate::error::{PipelineError, Result};
use crate::traits::ai::{ArticleSummary, InsightExtractor, Summarizer};
use crate::traits::web::{ArticleLink, PageFetcher, QuoteListing, QuoteParser};
use crate::types::fragment::{Insight, InsightOutcome, InsightQuery};

fn record<T>(calls: &RwLock<Vec<T>>, call: T) {
    calls.write().unwrap_or_else(PoisonError::into_inner).push(call);
}

fn snapshot<T: Clone>(calls: &RwLock<Vec<T>>) -> Vec<T> {
    calls.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Serves canned pages by URL. Unknown URLs fail like a 404.
#[derive(Default)]
pub struct MockFetcher {
    pages: HashMap<String, String>,
    failures: HashSet<String>,
    calls: RwLock<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    /// Make fetching `url` fail even if a page is registered.
    pub fn with_failure(mut self, url: impl Into<String>) -> Self {
        self.failures.insert(url.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        snapshot(&self.calls)
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls().iter().filter(|called| *called == url).count()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        record(&self.calls, url.to_string());
        if self.failures.contains(url) {
            return Err(PipelineError::Fetch {
                url: url.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::Fetch {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }
}

/// Quote parser that ignores the HTML and returns a fixed listing.
#[derive(Debug, Clone, Default)]
pub struct StaticQuoteParser {
    listing: QuoteListing,
}

impl StaticQuoteParser {
    pub fn new(org: Option<&str>, links: Vec<ArticleLink>) -> Self {
        Self {
            listing: QuoteListing {
                org: org.map(str::to_string),
                links,
            },
        }
    }
}

impl QuoteParser for StaticQuoteParser {
    fn quote_url(&self, ticker: &str) -> String {
        format!("https://quotes.example.com/{ticker}/")
    }

    fn parse(&self, _html: &str) -> QuoteListing {
        self.listing.clone()
    }
}

/// Summarizer returning `summary of: <text>` and a fixed date.
pub struct MockSummarizer {
    publish_date: String,
    failing: Vec<String>,
    calls: RwLock<Vec<String>>,
}

impl Default for MockSummarizer {
    fn default() -> Self {
        Self {
            publish_date: "2025-01-01".to_string(),
            failing: Vec::new(),
            calls: RwLock::new(Vec::new()),
        }
    }
}

impl MockSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.publish_date = date.into();
        self
    }

    /// Fail for any text containing `needle`.
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.failing.push(needle.into());
        self
    }

    /// Texts passed to `summarize`, in call order.
    pub fn calls(&self) -> Vec<String> {
        snapshot(&self.calls)
    }
}

#[async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, _instructions: &str, text: &str) -> Result<ArticleSummary> {
        record(&self.calls, text.to_string());
        if self.failing.iter().any(|needle| text.contains(needle.as_str())) {
            return Err(PipelineError::Ai("API call failed: 500".to_string()));
        }
        Ok(ArticleSummary {
            summary: format!("summary of: {text}"),
            publish_date: self.publish_date.clone(),
        })
    }
}

/// Insight extractor keyed by article title.
///
/// Titles not configured otherwise produce a positive related insight.
#[derive(Default)]
pub struct MockInsightExtractor {
    insights: HashMap<String, Insight>,
    unrelated: HashSet<String>,
    failing: HashSet<String>,
    calls: RwLock<Vec<InsightQuery>>,
}

impl MockInsightExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_insight(mut self, title: impl Into<String>, insight: Insight) -> Self {
        self.insights.insert(title.into(), insight);
        self
    }

    /// Report "no relation" for this title.
    pub fn unrelated(mut self, title: impl Into<String>) -> Self {
        self.unrelated.insert(title.into());
        self
    }

    /// Return malformed output for this title.
    pub fn failing_on(mut self, title: impl Into<String>) -> Self {
        self.failing.insert(title.into());
        self
    }

    pub fn calls(&self) -> Vec<InsightQuery> {
        snapshot(&self.calls)
    }
}

#[async_trait]
impl InsightExtractor for MockInsightExtractor {
    async fn extract(&self, _instructions: &str, query: &InsightQuery) -> Result<InsightOutcome> {
        record(&self.calls, query.clone());
        if self.failing.contains(&query.title) {
            return Err(PipelineError::Ai("malformed model output".to_string()));
        }
        if self.unrelated.contains(&query.title) {
            return Ok(InsightOutcome::Unrelated);
        }
        let insight = self.insights.get(&query.title).cloned().unwrap_or_else(|| Insight {
            related_reason_simple: format!("mentions {}", query.ticker),
            related_reason_short: format!("{} concerns {}", query.title, query.ticker),
            polarity: "positive".to_string(),
            actual_trend: "up".to_string(),
            quote_frag: query.content.chars().take(40).collect(),
        });
        Ok(insight.into())
    }
}
