//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;
use crate::traits::store::{ChartCache, FragmentStore, NewsStore, StatusStore};
use crate::types::{
    chart::ChartEntry,
    fragment::{Fragment, FragmentKey},
    news::{ArticleUpdate, NewsRecord},
    status::StatusEvent,
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory storage for every pipeline table.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryStore {
    sequence: AtomicI64,
    status: RwLock<BTreeMap<String, Vec<StatusEvent>>>,
    charts: RwLock<Vec<ChartEntry>>,
    news: RwLock<HashMap<String, NewsRecord>>,
    fragments: RwLock<Vec<(i64, Fragment)>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            sequence: AtomicI64::new(1),
            status: RwLock::new(BTreeMap::new()),
            charts: RwLock::new(Vec::new()),
            news: RwLock::new(HashMap::new()),
            fragments: RwLock::new(Vec::new()),
        }
    }

    fn next_id(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    pub fn news_count(&self) -> usize {
        read(&self.news).len()
    }

    pub fn chart_entry_count(&self) -> usize {
        read(&self.charts).len()
    }

    pub fn fragment_count(&self) -> usize {
        read(&self.fragments).len()
    }

    /// Put a record in place as-is, bypassing the pending-only insert.
    pub fn seed_record(&self, record: NewsRecord) {
        write(&self.news).insert(record.url.clone(), record);
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn push_event(
        &self,
        job_id: &str,
        status: &str,
        time: DateTime<Utc>,
    ) -> Result<StatusEvent> {
        let event = StatusEvent {
            job_id: job_id.to_string(),
            status: status.to_string(),
            time,
            sequence: self.next_id(),
        };
        write(&self.status)
            .entry(job_id.to_string())
            .or_default()
            .push(event.clone());
        Ok(event)
    }

    async fn events(&self, job_id: &str) -> Result<Vec<StatusEvent>> {
        Ok(read(&self.status).get(job_id).cloned().unwrap_or_default())
    }

    async fn delete_events(&self, job_id: &str) -> Result<usize> {
        Ok(write(&self.status)
            .remove(job_id)
            .map(|events| events.len())
            .unwrap_or(0))
    }

    async fn job_ids(&self) -> Result<Vec<String>> {
        Ok(read(&self.status).keys().cloned().collect())
    }
}

#[async_trait]
impl ChartCache for MemoryStore {
    async fn insert_entry(
        &self,
        ticker: &str,
        urls: &[String],
        org: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<ChartEntry> {
        let entry = ChartEntry {
            id: self.next_id(),
            ticker: ticker.to_string(),
            urls: urls.to_vec(),
            org: org.map(str::to_string),
            created_at,
        };
        write(&self.charts).push(entry.clone());
        Ok(entry)
    }

    async fn entries(&self, ticker: &str) -> Result<Vec<ChartEntry>> {
        Ok(read(&self.charts)
            .iter()
            .filter(|entry| entry.ticker == ticker)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NewsStore for MemoryStore {
    async fn insert_pending(&self, record: &NewsRecord) -> Result<Option<i64>> {
        let mut news = write(&self.news);
        if news.contains_key(&record.url) {
            return Ok(None);
        }
        news.insert(record.url.clone(), record.clone());
        Ok(Some(self.next_id()))
    }

    async fn get_record(&self, url: &str) -> Result<Option<NewsRecord>> {
        Ok(read(&self.news).get(url).cloned())
    }

    async fn update_article(&self, url: &str, update: &ArticleUpdate) -> Result<bool> {
        match write(&self.news).get_mut(url) {
            Some(record) => {
                record.apply(update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn all_urls(&self) -> Result<Vec<String>> {
        let mut urls: Vec<String> = read(&self.news).keys().cloned().collect();
        urls.sort();
        Ok(urls)
    }
}

#[async_trait]
impl FragmentStore for MemoryStore {
    async fn has_fragment(&self, key: &FragmentKey) -> Result<bool> {
        Ok(read(&self.fragments)
            .iter()
            .any(|(_, f)| f.url == key.url && f.ticker == key.ticker))
    }

    async fn insert_fragment(&self, fragment: &Fragment) -> Result<i64> {
        let id = self.next_id();
        write(&self.fragments).push((id, fragment.clone()));
        Ok(id)
    }

    async fn fragments_for_ticker(&self, ticker: &str, limit: usize) -> Result<Vec<Fragment>> {
        let mut matching: Vec<(i64, Fragment)> = read(&self.fragments)
            .iter()
            .filter(|(_, f)| f.ticker == ticker)
            .cloned()
            .collect();
        matching.sort_by(|(a_id, a), (b_id, b)| {
            b.time_created.cmp(&a.time_created).then(b_id.cmp(a_id))
        });
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|(_, fragment)| fragment)
            .collect())
    }
}
