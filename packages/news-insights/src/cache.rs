//! Staleness cache over quote-page downloads.

use std::sync::Arc;

use chrono::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;
use crate::traits::store::ChartCache;
use crate::types::chart::ChartEntry;

/// Default time a quote-page download stays fresh.
pub fn default_ttl() -> Duration {
    Duration::hours(24)
}

/// Result of a single cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness {
    Fresh(ChartEntry),
    /// Carries the expired entry when there is one.
    Stale(Option<ChartEntry>),
}

#[derive(Clone)]
pub struct StalenessCache {
    store: Arc<dyn ChartCache>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl StalenessCache {
    pub fn new(store: Arc<dyn ChartCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: default_ttl(),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Record a successful download now. Returns the entry id.
    pub async fn put(&self, ticker: &str, urls: &[String], org: Option<&str>) -> Result<i64> {
        let entry = self
            .store
            .insert_entry(ticker, urls, org, self.clock.now())
            .await?;
        debug!(ticker = %ticker, urls = urls.len(), "cache entry recorded");
        Ok(entry.id)
    }

    /// Newest entry, ties on `created_at` going to the later insert.
    pub async fn latest(&self, ticker: &str) -> Result<Option<ChartEntry>> {
        Ok(self
            .store
            .entries(ticker)
            .await?
            .into_iter()
            .max_by_key(|entry| (entry.created_at, entry.id)))
    }

    pub async fn is_stale(&self, ticker: &str, ttl: Duration) -> Result<bool> {
        Ok(match self.latest(ticker).await? {
            Some(entry) => self.expired(&entry, ttl),
            None => true,
        })
    }

    pub async fn lookup(&self, ticker: &str) -> Result<Freshness> {
        Ok(match self.latest(ticker).await? {
            Some(entry) if !self.expired(&entry, self.ttl) => Freshness::Fresh(entry),
            other => Freshness::Stale(other),
        })
    }

    fn expired(&self, entry: &ChartEntry, ttl: Duration) -> bool {
        self.clock.now() - entry.created_at >= ttl
    }
}
