//! Ticker News Insights Pipeline
//!
//! Turns a request for a stock ticker into insight fragments about recent news,
//! through three queued stages:
//!
//! ```text
//! submit ─► news_job_queue ─► crawl ─► summary_job_queue ─► summarize
//!                                                             │
//!           fragments ◄─ insight ◄─ insight_job_queue ◄───────┘
//! ```
//!
//! Every stage appends free-form text to the job's status log; clients poll
//! the log until it resolves to ready or failed, or give up with "busy".
//!
//! # Usage
//!
//! ```rust,ignore
//! use news_insights::{Pipeline, PollConfig, Session, SqliteStore, StatusLog, SystemClock};
//!
//! let store = Arc::new(SqliteStore::new("sqlite://data/news_insights.db?mode=rwc").await?);
//! let status = StatusLog::new(store.clone(), Arc::new(SystemClock));
//! let pipeline = Pipeline::new(status, store.clone(), store);
//!
//! let submission = pipeline.submit(&Session::new("alice", "s1")?, "AAPL").await?;
//! let outcome = pipeline.poll(submission.job_id.as_str(), PollConfig::default()).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator abstractions (stores, queue transport, web, AI, pacing)
//! - [`types`] - Job ids, payloads, status events, records and fragments
//! - [`status_log`], [`cache`], [`dedup`], [`queue`] - Pipeline building blocks
//! - [`stages`] - Crawl, summarize and insight workers
//! - [`pipeline`] - Submission and status polling
//! - [`stores`] - Storage implementations (MemoryStore, SqliteStore)
//! - [`web`], [`ai`] - Production collaborators
//! - [`testing`] - Mock implementations for testing

pub mod ai;
pub mod cache;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod rate_limit;
pub mod runner;
pub mod stages;
pub mod status_log;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;
pub mod web;

// Re-export core types at crate root
pub use error::{PipelineError, Result};
pub use traits::{
    ai::{ArticleSummary, InsightExtractor, Summarizer},
    queue::QueueBackend,
    rate_limit::RateLimiter,
    store::{ChartCache, FragmentStore, NewsStore, PipelineStore, StatusStore},
    web::{ArticleLink, ContentExtractor, PageArchive, PageFetcher, PageKind, QuoteListing, QuoteParser},
};
pub use types::{
    chart::ChartEntry,
    fragment::{Fragment, FragmentKey, Insight, InsightOutcome, InsightQuery},
    job::{
        normalize_ticker, CrawlRequest, InsightRequest, Job, JobId, JobIdParts, Session, Stage,
        StagePayload, SummarizeRequest,
    },
    news::{ArticleUpdate, NewsRecord},
    status::{JobStatus, StatusEvent, StatusKind},
};

// Re-export pipeline components
pub use cache::{Freshness, StalenessCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, PipelineConfig};
pub use dedup::{ArticleIndex, DedupIndex, FragmentIndex};
pub use pipeline::{Pipeline, PollConfig, PollOutcome, Submission};
pub use queue::{MemoryQueue, StageQueue};
pub use rate_limit::{FixedDelay, GovernorLimiter, Unlimited};
pub use runner::WorkerSet;
pub use stages::{CrawlStage, InsightStage, StageHandler, StageWorker, SummarizeStage, WorkerConfig};
pub use status_log::StatusLog;

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "sqlite")]
pub use stores::SqliteStore;

// Re-export collaborators
pub use ai::OpenAiClient;
pub use web::{FsArchive, HttpFetcher, MainTextExtractor, MemoryArchive, QuotePageParser};
