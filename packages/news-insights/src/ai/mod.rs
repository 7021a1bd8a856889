//! LLM-backed summarizer and insight extractor, plus the parsing of their
//! output.

pub mod openai;
pub mod prompts;

pub use openai::OpenAiClient;

use crate::error::Result;
use crate::traits::ai::ArticleSummary;
use crate::types::fragment::{Insight, InsightOutcome, InsightQuery};

/// Parse `Summary:` / `Date:` lines. Without a `Summary:` line the whole
/// output is the summary; without a `Date:` line the date is empty.
pub fn parse_summary_output(output: &str) -> ArticleSummary {
    let field = |name: &str| {
        output.lines().find_map(|line| {
            let (key, value) = line.trim_start().split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    };

    ArticleSummary {
        summary: field("summary").unwrap_or_else(|| output.trim().to_string()),
        publish_date: field("date").unwrap_or_default(),
    }
}

/// Parse the extractor's JSON object. Missing fields take their defaults.
pub fn parse_insight_output(output: &str) -> Result<InsightOutcome> {
    let insight: Insight = serde_json::from_str(output.trim())?;
    Ok(insight.into())
}

/// User message for the insight call.
pub fn insight_user_message(query: &InsightQuery) -> String {
    format!(
        "Company: {}\nTicker: {}\nArticle Title: {}\nPublication Date: {}\n\nNews Content:\n{}",
        query.org.as_deref().unwrap_or("Not specified"),
        query.ticker,
        query.title,
        if query.publish_date.is_empty() {
            "Not specified"
        } else {
            query.publish_date.as_str()
        },
        query.content,
    )
}

/// User message for the summary call.
pub fn summary_user_message(content: &str) -> String {
    format!("Content: {content}\n\nPlease provide a summary and infer the publication date.")
}
