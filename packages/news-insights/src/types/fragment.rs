//! Insight fragments: what the pipeline ultimately produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// `related_reason_simple` value meaning the article does not concern the ticker.
pub const NO_RELATION: &str = "no relation";

/// Dedup key for fragments: one article seen for one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FragmentKey {
    pub url: String,
    pub ticker: String,
}

impl FragmentKey {
    pub fn new(url: impl Into<String>, ticker: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ticker: ticker.into(),
        }
    }
}

fn neutral() -> String {
    "neutral".to_string()
}

fn unknown() -> String {
    "unknown".to_string()
}

// A JSON `null` counts as a missing field.
fn empty_if_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn neutral_if_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(neutral))
}

fn unknown_if_null<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(unknown))
}

/// Fields the extraction model reports for one article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(default, deserialize_with = "empty_if_null")]
    pub related_reason_simple: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub related_reason_short: String,
    #[serde(default = "neutral", deserialize_with = "neutral_if_null")]
    pub polarity: String,
    #[serde(default = "unknown", deserialize_with = "unknown_if_null")]
    pub actual_trend: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub quote_frag: String,
}

impl Default for Insight {
    fn default() -> Self {
        Self {
            related_reason_simple: String::new(),
            related_reason_short: String::new(),
            polarity: neutral(),
            actual_trend: unknown(),
            quote_frag: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightOutcome {
    Related(Insight),
    Unrelated,
}

impl From<Insight> for InsightOutcome {
    fn from(insight: Insight) -> Self {
        if insight.related_reason_simple.trim() == NO_RELATION {
            InsightOutcome::Unrelated
        } else {
            InsightOutcome::Related(insight)
        }
    }
}

/// Input handed to the insight extractor for one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightQuery {
    pub org: Option<String>,
    pub ticker: String,
    pub title: String,
    pub publish_date: String,
    /// Article text, already truncated.
    pub content: String,
}

/// A persisted insight about one article for one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub org: Option<String>,
    pub ticker: String,
    pub url: String,
    pub title: String,
    pub time_created: DateTime<Utc>,
    pub related_reason_simple: String,
    pub related_reason_short: String,
    pub polarity: String,
    pub actual_trend: String,
    pub quote_frag: String,
}

impl Fragment {
    pub fn new(
        key: FragmentKey,
        org: Option<String>,
        title: impl Into<String>,
        insight: Insight,
        time_created: DateTime<Utc>,
    ) -> Self {
        Self {
            org,
            ticker: key.ticker,
            url: key.url,
            title: title.into(),
            time_created,
            related_reason_simple: insight.related_reason_simple,
            related_reason_short: insight.related_reason_short,
            polarity: insight.polarity,
            actual_trend: insight.actual_trend,
            quote_frag: insight.quote_frag,
        }
    }

    pub fn key(&self) -> FragmentKey {
        FragmentKey::new(&self.url, &self.ticker)
    }
}
