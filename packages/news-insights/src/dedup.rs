//! Existence checks that let stages skip work already done.
//!
//! Two instances exist: [`ArticleIndex`] (keyed by URL, backed by the news
//! records) and [`FragmentIndex`] (keyed by `(url, ticker)`, backed by the
//! fragments). Marking twice is never an error.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::traits::store::{FragmentStore, NewsStore};
use crate::types::{
    fragment::{Fragment, FragmentKey},
    news::NewsRecord,
};

#[async_trait]
pub trait DedupIndex: Send + Sync {
    type Key: ?Sized + Sync;
    type Record: Send + 'static;

    async fn exists(&self, key: &Self::Key) -> Result<bool>;

    /// Record the fact. Returns the new id, or `None` if the backend treated
    /// the call as a no-op.
    async fn mark(&self, key: &Self::Key, record: Self::Record) -> Result<Option<i64>>;
}

/// Articles already downloaded. A second mark of the same URL is a no-op.
#[derive(Clone)]
pub struct ArticleIndex {
    store: Arc<dyn NewsStore>,
}

impl ArticleIndex {
    pub fn new(store: Arc<dyn NewsStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DedupIndex for ArticleIndex {
    type Key = str;
    type Record = NewsRecord;

    async fn exists(&self, url: &str) -> Result<bool> {
        self.store.has_record(url).await
    }

    async fn mark(&self, url: &str, record: NewsRecord) -> Result<Option<i64>> {
        let record = NewsRecord {
            url: url.to_string(),
            ..record
        };
        self.store.insert_pending(&record).await
    }
}

/// Articles already turned into fragments for a ticker. Duplicates are kept.
#[derive(Clone)]
pub struct FragmentIndex {
    store: Arc<dyn FragmentStore>,
}

impl FragmentIndex {
    pub fn new(store: Arc<dyn FragmentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DedupIndex for FragmentIndex {
    type Key = FragmentKey;
    type Record = Fragment;

    async fn exists(&self, key: &FragmentKey) -> Result<bool> {
        self.store.has_fragment(key).await
    }

    async fn mark(&self, key: &FragmentKey, record: Fragment) -> Result<Option<i64>> {
        let fragment = Fragment {
            url: key.url.clone(),
            ticker: key.ticker.clone(),
            ..record
        };
        Ok(Some(self.store.insert_fragment(&fragment).await?))
    }
}
