//! Web collaborators: fetching, quote-page parsing, article text and archiving.

use async_trait::async_trait;

use crate::error::Result;

/// Fetch a page body.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// A link to a news article found on a quote page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleLink {
    pub url: String,
    pub title: String,
}

impl ArticleLink {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// What a quote page tells us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteListing {
    pub org: Option<String>,
    pub links: Vec<ArticleLink>,
}

/// Site-specific knowledge of the ticker aggregation page.
pub trait QuoteParser: Send + Sync {
    fn quote_url(&self, ticker: &str) -> String;

    fn parse(&self, html: &str) -> QuoteListing;
}

/// Pull readable article text out of raw HTML.
///
/// Deterministic; `None` when the page is not recognized.
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Quote,
    News,
}

impl PageKind {
    /// Infix used in archived file names.
    pub fn tag(&self) -> &'static str {
        match self {
            PageKind::Quote => "TM",
            PageKind::News => "news_TM",
        }
    }
}

/// Raw HTML storage. `save` returns the path recorded on the news record.
#[async_trait]
pub trait PageArchive: Send + Sync {
    async fn save(&self, ticker: &str, kind: PageKind, html: &str) -> Result<String>;

    async fn load(&self, path: &str) -> Result<String>;
}
