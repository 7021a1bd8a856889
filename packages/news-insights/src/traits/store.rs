//! Storage traits for status events, cache entries, news records and fragments.
//!
//! The storage layer is split into focused traits:
//! - `StatusStore`: append-only per-job status events
//! - `ChartCache`: append-only quote-page download records
//! - `NewsStore`: article records keyed by URL
//! - `FragmentStore`: insight fragments keyed by `(url, ticker)`
//! - `PipelineStore`: composite trait combining all four

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{
    chart::ChartEntry,
    fragment::{Fragment, FragmentKey},
    news::{ArticleUpdate, NewsRecord},
    status::StatusEvent,
};

/// Append-only event lists, one per job.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Append an event. The store assigns the sequence number.
    async fn push_event(
        &self,
        job_id: &str,
        status: &str,
        time: DateTime<Utc>,
    ) -> Result<StatusEvent>;

    /// All events for a job in insertion order. Empty when the job is unknown.
    async fn events(&self, job_id: &str) -> Result<Vec<StatusEvent>>;

    /// Drop a job's events, returning how many were removed.
    async fn delete_events(&self, job_id: &str) -> Result<usize>;

    /// Every job id with at least one event.
    async fn job_ids(&self) -> Result<Vec<String>>;
}

/// Record of quote-page downloads.
#[async_trait]
pub trait ChartCache: Send + Sync {
    async fn insert_entry(
        &self,
        ticker: &str,
        urls: &[String],
        org: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<ChartEntry>;

    /// All entries for a ticker, in any order.
    async fn entries(&self, ticker: &str) -> Result<Vec<ChartEntry>>;
}

/// Article records.
#[async_trait]
pub trait NewsStore: Send + Sync {
    /// Insert a record unless its URL is already present.
    ///
    /// Returns the new row id, or `None` when the URL already existed.
    async fn insert_pending(&self, record: &NewsRecord) -> Result<Option<i64>>;

    async fn get_record(&self, url: &str) -> Result<Option<NewsRecord>>;

    /// Look up several URLs, keeping input order. Unknown URLs map to `None`.
    async fn get_records(&self, urls: &[String]) -> Result<Vec<(String, Option<NewsRecord>)>> {
        let mut records = Vec::with_capacity(urls.len());
        for url in urls {
            records.push((url.clone(), self.get_record(url).await?));
        }
        Ok(records)
    }

    async fn has_record(&self, url: &str) -> Result<bool> {
        Ok(self.get_record(url).await?.is_some())
    }

    /// Write content, summary and publish date in one update.
    ///
    /// Returns false when no record has that URL.
    async fn update_article(&self, url: &str, update: &ArticleUpdate) -> Result<bool>;

    async fn all_urls(&self) -> Result<Vec<String>>;
}

/// Persisted insight fragments.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    async fn has_fragment(&self, key: &FragmentKey) -> Result<bool>;

    /// Append a fragment. Duplicates for the same key are kept.
    async fn insert_fragment(&self, fragment: &Fragment) -> Result<i64>;

    /// Newest first.
    async fn fragments_for_ticker(&self, ticker: &str, limit: usize) -> Result<Vec<Fragment>>;
}

/// Combined storage trait.
pub trait PipelineStore: StatusStore + ChartCache + NewsStore + FragmentStore {}

impl<T> PipelineStore for T where T: StatusStore + ChartCache + NewsStore + FragmentStore {}
