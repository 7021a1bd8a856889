//! Article records created by the crawl stage and filled in by summarize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder for `content` and `summary` until the summarize stage runs.
pub const PENDING: &str = "pending";

/// A downloaded news article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRecord {
    /// Unique key
    pub url: String,

    pub title: String,

    /// Where the raw HTML was archived
    pub file_path: String,

    pub create_time: DateTime<Utc>,

    /// Extracted article text, or [`PENDING`]
    pub content: String,

    /// LLM summary, or [`PENDING`]
    pub summary: String,

    /// Publication date as reported by the summarizer, empty until known
    pub publish_date: String,
}

impl NewsRecord {
    /// A freshly crawled article awaiting summarization.
    pub fn pending(
        url: impl Into<String>,
        title: impl Into<String>,
        file_path: impl Into<String>,
        create_time: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            file_path: file_path.into(),
            create_time,
            content: PENDING.to_string(),
            summary: PENDING.to_string(),
            publish_date: String::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.content == PENDING
    }

    pub fn apply(&mut self, update: &ArticleUpdate) {
        self.content = update.content.clone();
        self.summary = update.summary.clone();
        self.publish_date = update.publish_date.clone();
    }
}

/// The single write the summarize stage makes to a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleUpdate {
    pub content: String,
    pub summary: String,
    pub publish_date: String,
}
