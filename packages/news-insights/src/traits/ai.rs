//! LLM capabilities used by the summarize and insight stages.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::fragment::{InsightOutcome, InsightQuery};

/// Output of the summarization call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub summary: String,
    pub publish_date: String,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize article text and infer its publication date.
    ///
    /// Timeouts and non-success responses are errors; the caller skips the
    /// article and leaves it pending.
    async fn summarize(&self, instructions: &str, text: &str) -> Result<ArticleSummary>;
}

#[async_trait]
pub trait InsightExtractor: Send + Sync {
    /// Decide whether an article bears on the ticker and, if so, how.
    ///
    /// Malformed model output is an error.
    async fn extract(&self, instructions: &str, query: &InsightQuery) -> Result<InsightOutcome>;
}
