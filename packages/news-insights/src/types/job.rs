//! Job identity and the per-stage payloads carried on the queues.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// The client's identity for a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub session_id: String,
}

impl Session {
    /// Both ids must be non-empty. The session id may not contain `@` since
    /// it sits between other `@`-separated fields of the job id.
    pub fn new(user_id: impl Into<String>, session_id: impl Into<String>) -> Result<Self> {
        let user_id = user_id.into().trim().to_string();
        let session_id = session_id.into().trim().to_string();
        if user_id.is_empty() || session_id.is_empty() || session_id.contains('@') {
            return Err(PipelineError::InvalidSession);
        }
        Ok(Self {
            user_id,
            session_id,
        })
    }
}

/// Trim and upper-case a ticker, rejecting empty or path-unsafe input.
pub fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim().to_uppercase();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=');
    if ticker.is_empty() || !ticker.chars().all(allowed) {
        return Err(PipelineError::InvalidTicker(raw.to_string()));
    }
    Ok(ticker)
}

/// Identifier shared by every stage of one submission.
///
/// Generated ids look like `{user}@{session}@{ticker}@{8 hex}`. Ids read back
/// from queues or the command line are treated as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate(session: &Session, ticker: &str) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!(
            "{}@{}@{}@{}",
            session.user_id,
            session.session_id,
            ticker,
            &suffix[..8]
        ))
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a generated id into its four fields.
    ///
    /// Fields are taken from the right, so a user id containing `@` (an email
    /// address, say) still parses.
    pub fn parse(raw: &str) -> Result<JobIdParts> {
        let mut fields = raw.rsplitn(4, '@');
        let (Some(suffix), Some(ticker), Some(session_id), Some(user_id)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(PipelineError::InvalidJobId(raw.to_string()));
        };
        if [user_id, session_id, ticker, suffix]
            .iter()
            .any(|field| field.is_empty())
        {
            return Err(PipelineError::InvalidJobId(raw.to_string()));
        }
        Ok(JobIdParts {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            ticker: ticker.to_string(),
            suffix: suffix.to_string(),
        })
    }

    pub fn parts(&self) -> Result<JobIdParts> {
        Self::parse(&self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdParts {
    pub user_id: String,
    pub session_id: String,
    pub ticker: String,
    pub suffix: String,
}

/// The three pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Crawl,
    Summarize,
    Insight,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Crawl, Stage::Summarize, Stage::Insight];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Crawl => "crawl",
            Stage::Summarize => "summarize",
            Stage::Insight => "insight",
        }
    }

    pub fn queue_name(&self) -> &'static str {
        match self {
            Stage::Crawl => CrawlRequest::QUEUE,
            Stage::Summarize => SummarizeRequest::QUEUE,
            Stage::Insight => InsightRequest::QUEUE,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "crawl" => Ok(Stage::Crawl),
            "summarize" => Ok(Stage::Summarize),
            "insight" => Ok(Stage::Insight),
            other => Err(PipelineError::Config(format!("unknown stage: {other}"))),
        }
    }
}

/// A payload that travels on one stage queue.
pub trait StagePayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    const QUEUE: &'static str;
    const STAGE: Stage;
}

/// A unit of work on a stage queue.
///
/// Serialized flat: `{"job_id": ..., "data": ..., "ticker": ..., "org": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job<P> {
    pub job_id: JobId,
    #[serde(flatten)]
    pub payload: P,
}

impl<P> Job<P> {
    pub fn new(job_id: JobId, payload: P) -> Self {
        Self { job_id, payload }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRequest {
    #[serde(rename = "data")]
    pub ticker: String,
}

impl StagePayload for CrawlRequest {
    const QUEUE: &'static str = "news_job_queue";
    const STAGE: Stage = Stage::Crawl;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeRequest {
    #[serde(rename = "data")]
    pub urls: Vec<String>,
    pub ticker: String,
    #[serde(default)]
    pub org: Option<String>,
}

impl StagePayload for SummarizeRequest {
    const QUEUE: &'static str = "summary_job_queue";
    const STAGE: Stage = Stage::Summarize;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightRequest {
    #[serde(rename = "data")]
    pub urls: Vec<String>,
    pub ticker: String,
    #[serde(default)]
    pub org: Option<String>,
}

impl StagePayload for InsightRequest {
    const QUEUE: &'static str = "insight_job_queue";
    const STAGE: Stage = Stage::Insight;
}

impl From<SummarizeRequest> for InsightRequest {
    fn from(req: SummarizeRequest) -> Self {
        Self {
            urls: req.urls,
            ticker: req.ticker,
            org: req.org,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("alice", "s1").unwrap()
    }

    #[test]
    fn generated_id_parses_back() {
        let id = JobId::generate(&session(), "AAPL");
        let parts = id.parts().unwrap();
        assert_eq!(parts.user_id, "alice");
        assert_eq!(parts.session_id, "s1");
        assert_eq!(parts.ticker, "AAPL");
        assert_eq!(parts.suffix.len(), 8);
        assert!(parts.suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_differ() {
        let a = JobId::generate(&session(), "AAPL");
        let b = JobId::generate(&session(), "AAPL");
        assert_ne!(a, b);
    }

    #[test]
    fn user_id_may_contain_at_sign() {
        let session = Session::new("a@example.com", "s1").unwrap();
        let parts = JobId::generate(&session, "MSFT").parts().unwrap();
        assert_eq!(parts.user_id, "a@example.com");
        assert_eq!(parts.session_id, "s1");
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(JobId::parse("only@three@fields").is_err());
        assert!(JobId::parse("u@@AAPL@deadbeef").is_err());
    }

    #[test]
    fn incomplete_sessions_are_rejected() {
        assert!(Session::new("", "s1").is_err());
        assert!(Session::new("alice", "  ").is_err());
        assert!(Session::new("alice", "s@1").is_err());
    }

    #[test]
    fn tickers_are_normalized() {
        assert_eq!(normalize_ticker(" aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_ticker("0005.hk").unwrap(), "0005.HK");
        assert!(normalize_ticker("   ").is_err());
        assert!(normalize_ticker("../etc").is_err());
    }

    #[test]
    fn jobs_serialize_flat() {
        let job = Job::new(
            JobId::new("u@s@AAPL@0000abcd"),
            SummarizeRequest {
                urls: vec!["https://example.com/a".into()],
                ticker: "AAPL".into(),
                org: Some("Apple Inc.".into()),
            },
        );
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["job_id"], "u@s@AAPL@0000abcd");
        assert_eq!(value["data"][0], "https://example.com/a");
        assert_eq!(value["org"], "Apple Inc.");

        let back: Job<SummarizeRequest> = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }
}
