//! Per-job status log.
//!
//! Every stage appends free-form status text. [`StatusLog::resolve`] turns the
//! event list into a single [`JobStatus`]:
//!
//! 1. no events → unknown
//! 2. any event equal to the terminal marker → ready, even if later events exist
//! 3. otherwise the newest event by `(time, sequence)`

use std::sync::Arc;

use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;
use crate::traits::store::StatusStore;
use crate::types::status::{JobStatus, StatusEvent, StatusKind, INSIGHTS_READY};

/// Logical key under which a job's events live.
pub fn status_key(job_id: &str) -> String {
    format!("job:{job_id}:status")
}

#[derive(Clone)]
pub struct StatusLog {
    store: Arc<dyn StatusStore>,
    clock: Arc<dyn Clock>,
    terminal_marker: String,
}

impl StatusLog {
    pub fn new(store: Arc<dyn StatusStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            terminal_marker: INSIGHTS_READY.to_string(),
        }
    }

    pub fn with_terminal_marker(mut self, marker: impl Into<String>) -> Self {
        self.terminal_marker = marker.into();
        self
    }

    pub fn terminal_marker(&self) -> &str {
        &self.terminal_marker
    }

    pub async fn append(&self, job_id: &str, status: &str) -> Result<StatusEvent> {
        let event = self
            .store
            .push_event(job_id, status, self.clock.now())
            .await?;
        debug!(key = %status_key(job_id), status = %status, "status appended");
        Ok(event)
    }

    pub async fn resolve(&self, job_id: &str) -> Result<JobStatus> {
        let events = self.store.events(job_id).await?;

        if events.iter().any(|e| e.status == self.terminal_marker) {
            return Ok(JobStatus {
                kind: StatusKind::Ready,
                text: self.terminal_marker.clone(),
            });
        }

        let Some(latest) = events.into_iter().max_by_key(|e| (e.time, e.sequence)) else {
            return Ok(JobStatus::unknown());
        };

        Ok(JobStatus {
            kind: self.classify(&latest.status),
            text: latest.status,
        })
    }

    /// Events newest first.
    pub async fn history(&self, job_id: &str) -> Result<Vec<StatusEvent>> {
        let mut events = self.store.events(job_id).await?;
        events.sort_by(|a, b| (b.time, b.sequence).cmp(&(a.time, a.sequence)));
        Ok(events)
    }

    pub async fn clear(&self, job_id: &str) -> Result<usize> {
        self.store.delete_events(job_id).await
    }

    pub async fn job_ids(&self) -> Result<Vec<String>> {
        self.store.job_ids().await
    }

    pub fn classify(&self, text: &str) -> StatusKind {
        StatusKind::classify(text, &self.terminal_marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::stores::MemoryStore;
    use crate::types::status::{news_ready, SUBMITTED, SUMMARIES_READY};
    use chrono::{Duration, Utc};

    fn log() -> (StatusLog, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let log = StatusLog::new(Arc::new(MemoryStore::new()), clock.clone());
        (log, clock)
    }

    #[test]
    fn status_key_format() {
        assert_eq!(status_key("u@s@AAPL@1a2b3c4d"), "job:u@s@AAPL@1a2b3c4d:status");
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (log, _) = log();
        let status = log.resolve("nope").await.unwrap();
        assert_eq!(status.kind, StatusKind::Unknown);
        assert_eq!(status.text, "unknown");
    }

    #[tokio::test]
    async fn test_latest_event_wins() {
        let (log, clock) = log();
        log.append("job", SUBMITTED).await.unwrap();
        clock.advance(Duration::seconds(1));
        log.append("job", &news_ready("job")).await.unwrap();

        let status = log.resolve("job").await.unwrap();
        assert_eq!(status.kind, StatusKind::InProgress);
        assert_eq!(status.text, "news ready job");
    }

    #[tokio::test]
    async fn test_terminal_is_not_masked_by_later_events() {
        let (log, clock) = log();
        log.append("job", INSIGHTS_READY).await.unwrap();
        clock.advance(Duration::seconds(5));
        log.append("job", SUMMARIES_READY).await.unwrap();

        let status = log.resolve("job").await.unwrap();
        assert_eq!(status.kind, StatusKind::Ready);
        assert_eq!(status.text, INSIGHTS_READY);
    }

    #[tokio::test]
    async fn test_timestamp_ties_use_sequence() {
        let (log, _) = log();
        log.append("job", SUBMITTED).await.unwrap();
        log.append("job", "crawl failed: boom").await.unwrap();

        let status = log.resolve("job").await.unwrap();
        assert_eq!(status.kind, StatusKind::Failed);
    }

    #[tokio::test]
    async fn test_history_and_clear() {
        let (log, clock) = log();
        log.append("job", SUBMITTED).await.unwrap();
        clock.advance(Duration::seconds(1));
        log.append("job", SUMMARIES_READY).await.unwrap();

        let history = log.history("job").await.unwrap();
        assert_eq!(history[0].status, SUMMARIES_READY);
        assert_eq!(history[1].status, SUBMITTED);
        assert_eq!(log.job_ids().await.unwrap(), vec!["job".to_string()]);

        assert_eq!(log.clear("job").await.unwrap(), 2);
        assert_eq!(log.resolve("job").await.unwrap().kind, StatusKind::Unknown);
    }

    #[tokio::test]
    async fn test_custom_terminal_marker() {
        let (log, _) = log();
        let log = log.with_terminal_marker("news crops ready");
        log.append("job", "news crops ready").await.unwrap();
        assert_eq!(log.resolve("job").await.unwrap().kind, StatusKind::Ready);
    }
}
