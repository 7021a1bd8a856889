//! SQLite storage implementation.
//!
//! One database holds every pipeline table plus the stage queues, so a
//! single file is enough for a worker host and its clients.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tokio::time::Instant;

use crate::error::{PipelineError, Result};
use crate::traits::queue::QueueBackend;
use crate::traits::store::{ChartCache, FragmentStore, NewsStore, StatusStore};
use crate::types::{
    chart::ChartEntry,
    fragment::{Fragment, FragmentKey},
    news::{ArticleUpdate, NewsRecord},
    status::StatusEvent,
};

/// How often an empty queue is re-checked while a pop waits.
const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .map_err(|e| PipelineError::storage(format!("Invalid date {raw:?}: {e}")))?
        .with_timezone(&Utc))
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// SQLite-backed store and queue.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and create the schema.
    ///
    /// # Example URLs
    /// - `sqlite://data/news_insights.db?mode=rwc` - file, created if missing
    /// - `sqlite::memory:` - use [`SqliteStore::in_memory`] instead
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Ephemeral database on a single long-lived connection.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS job_status (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id TEXT NOT NULL,
                status TEXT NOT NULL,
                time TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_job_status_job_id ON job_status(job_id);

            CREATE TABLE IF NOT EXISTS chart_cache (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticker TEXT NOT NULL,
                org TEXT,
                url_keys TEXT NOT NULL DEFAULT '[]',
                time_created TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chart_cache_ticker ON chart_cache(ticker);

            CREATE TABLE IF NOT EXISTS news (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                url TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                file_path TEXT NOT NULL,
                create_time TEXT NOT NULL,
                content TEXT NOT NULL,
                summary TEXT NOT NULL,
                publish_date TEXT NOT NULL DEFAULT ''
            );

            CREATE TABLE IF NOT EXISTS fragments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                org TEXT,
                ticker TEXT NOT NULL,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                time_created TEXT NOT NULL,
                related_reason_simple TEXT NOT NULL,
                related_reason_short TEXT NOT NULL,
                polarity TEXT NOT NULL,
                actual_trend TEXT NOT NULL,
                quote_frag TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_fragments_url_ticker ON fragments(url, ticker);
            CREATE INDEX IF NOT EXISTS idx_fragments_ticker ON fragments(ticker, time_created);

            CREATE TABLE IF NOT EXISTS queue_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                payload TEXT NOT NULL,
                enqueued_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_queue_jobs_queue ON queue_jobs(queue, id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn try_pop(&self, queue: &str) -> Result<Option<String>> {
        sqlx::query_scalar(
            r#"
            DELETE FROM queue_jobs
            WHERE id = (SELECT id FROM queue_jobs WHERE queue = ? ORDER BY id LIMIT 1)
            RETURNING payload
            "#,
        )
        .bind(queue)
        .fetch_optional(&self.pool)
        .await
        .map_err(PipelineError::queue)
    }
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct StatusRow {
    seq: i64,
    job_id: String,
    status: String,
    time: String,
}

impl StatusRow {
    fn into_event(self) -> Result<StatusEvent> {
        Ok(StatusEvent {
            time: parse_time(&self.time)?,
            job_id: self.job_id,
            status: self.status,
            sequence: self.seq,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChartRow {
    id: i64,
    ticker: String,
    org: Option<String>,
    url_keys: String,
    time_created: String,
}

impl ChartRow {
    fn into_entry(self) -> Result<ChartEntry> {
        let urls: Vec<String> = serde_json::from_str(&self.url_keys)
            .map_err(|e| PipelineError::storage(format!("Invalid url_keys JSON: {e}")))?;
        Ok(ChartEntry {
            id: self.id,
            created_at: parse_time(&self.time_created)?,
            ticker: self.ticker,
            urls,
            org: self.org,
        })
    }
}

#[derive(Debug, FromRow)]
struct NewsRow {
    url: String,
    title: String,
    file_path: String,
    create_time: String,
    content: String,
    summary: String,
    publish_date: String,
}

impl NewsRow {
    fn into_record(self) -> Result<NewsRecord> {
        Ok(NewsRecord {
            create_time: parse_time(&self.create_time)?,
            url: self.url,
            title: self.title,
            file_path: self.file_path,
            content: self.content,
            summary: self.summary,
            publish_date: self.publish_date,
        })
    }
}

#[derive(Debug, FromRow)]
struct FragmentRow {
    org: Option<String>,
    ticker: String,
    url: String,
    title: String,
    time_created: String,
    related_reason_simple: String,
    related_reason_short: String,
    polarity: String,
    actual_trend: String,
    quote_frag: String,
}

impl FragmentRow {
    fn into_fragment(self) -> Result<Fragment> {
        Ok(Fragment {
            time_created: parse_time(&self.time_created)?,
            org: self.org,
            ticker: self.ticker,
            url: self.url,
            title: self.title,
            related_reason_simple: self.related_reason_simple,
            related_reason_short: self.related_reason_short,
            polarity: self.polarity,
            actual_trend: self.actual_trend,
            quote_frag: self.quote_frag,
        })
    }
}

#[async_trait]
impl StatusStore for SqliteStore {
    async fn push_event(
        &self,
        job_id: &str,
        status: &str,
        time: DateTime<Utc>,
    ) -> Result<StatusEvent> {
        let seq: i64 = sqlx::query_scalar(
            "INSERT INTO job_status (job_id, status, time) VALUES (?, ?, ?) RETURNING seq",
        )
        .bind(job_id)
        .bind(status)
        .bind(format_time(time))
        .fetch_one(&self.pool)
        .await?;

        Ok(StatusEvent {
            job_id: job_id.to_string(),
            status: status.to_string(),
            time,
            sequence: seq,
        })
    }

    async fn events(&self, job_id: &str) -> Result<Vec<StatusEvent>> {
        let rows = sqlx::query_as::<_, StatusRow>(
            "SELECT seq, job_id, status, time FROM job_status WHERE job_id = ? ORDER BY seq",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StatusRow::into_event).collect()
    }

    async fn delete_events(&self, job_id: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM job_status WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn job_ids(&self) -> Result<Vec<String>> {
        let ids = sqlx::query_scalar("SELECT DISTINCT job_id FROM job_status ORDER BY job_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl ChartCache for SqliteStore {
    async fn insert_entry(
        &self,
        ticker: &str,
        urls: &[String],
        org: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<ChartEntry> {
        let url_keys = serde_json::to_string(urls)?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO chart_cache (ticker, org, url_keys, time_created)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(ticker)
        .bind(org)
        .bind(&url_keys)
        .bind(format_time(created_at))
        .fetch_one(&self.pool)
        .await?;

        Ok(ChartEntry {
            id,
            ticker: ticker.to_string(),
            urls: urls.to_vec(),
            org: org.map(str::to_string),
            created_at,
        })
    }

    async fn entries(&self, ticker: &str) -> Result<Vec<ChartEntry>> {
        let rows = sqlx::query_as::<_, ChartRow>(
            "SELECT id, ticker, org, url_keys, time_created FROM chart_cache WHERE ticker = ?",
        )
        .bind(ticker)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChartRow::into_entry).collect()
    }
}

#[async_trait]
impl NewsStore for SqliteStore {
    async fn insert_pending(&self, record: &NewsRecord) -> Result<Option<i64>> {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO news (url, title, file_path, create_time, content, summary, publish_date)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&record.url)
        .bind(&record.title)
        .bind(&record.file_path)
        .bind(format_time(record.create_time))
        .bind(&record.content)
        .bind(&record.summary)
        .bind(&record.publish_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn get_record(&self, url: &str) -> Result<Option<NewsRecord>> {
        let row = sqlx::query_as::<_, NewsRow>(
            r#"
            SELECT url, title, file_path, create_time, content, summary, publish_date
            FROM news WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(NewsRow::into_record).transpose()
    }

    async fn update_article(&self, url: &str, update: &ArticleUpdate) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE news SET content = ?, summary = ?, publish_date = ? WHERE url = ?",
        )
        .bind(&update.content)
        .bind(&update.summary)
        .bind(&update.publish_date)
        .bind(url)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn all_urls(&self) -> Result<Vec<String>> {
        let urls = sqlx::query_scalar("SELECT url FROM news ORDER BY url")
            .fetch_all(&self.pool)
            .await?;
        Ok(urls)
    }
}

#[async_trait]
impl FragmentStore for SqliteStore {
    async fn has_fragment(&self, key: &FragmentKey) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM fragments WHERE url = ? AND ticker = ? LIMIT 1")
                .bind(&key.url)
                .bind(&key.ticker)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn insert_fragment(&self, fragment: &Fragment) -> Result<i64> {
        let id = sqlx::query_scalar(
            r#"
            INSERT INTO fragments (
                org, ticker, url, title, time_created,
                related_reason_simple, related_reason_short, polarity, actual_trend, quote_frag
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&fragment.org)
        .bind(&fragment.ticker)
        .bind(&fragment.url)
        .bind(&fragment.title)
        .bind(format_time(fragment.time_created))
        .bind(&fragment.related_reason_simple)
        .bind(&fragment.related_reason_short)
        .bind(&fragment.polarity)
        .bind(&fragment.actual_trend)
        .bind(&fragment.quote_frag)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn fragments_for_ticker(&self, ticker: &str, limit: usize) -> Result<Vec<Fragment>> {
        let rows = sqlx::query_as::<_, FragmentRow>(
            r#"
            SELECT org, ticker, url, title, time_created,
                   related_reason_simple, related_reason_short, polarity, actual_trend, quote_frag
            FROM fragments
            WHERE ticker = ?
            ORDER BY time_created DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(ticker)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FragmentRow::into_fragment).collect()
    }
}

#[async_trait]
impl QueueBackend for SqliteStore {
    async fn push(&self, queue: &str, message: String) -> Result<()> {
        sqlx::query("INSERT INTO queue_jobs (queue, payload, enqueued_at) VALUES (?, ?, ?)")
            .bind(queue)
            .bind(message)
            .bind(format_time(Utc::now()))
            .execute(&self.pool)
            .await
            .map_err(PipelineError::queue)?;
        Ok(())
    }

    async fn pop(&self, queue: &str, timeout: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(message) = self.try_pop(queue).await? {
                return Ok(Some(message));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(QUEUE_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queue_jobs WHERE queue = ?")
            .bind(queue)
            .fetch_one(&self.pool)
            .await
            .map_err(PipelineError::queue)?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fragment::Insight;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_status_events_keep_order_and_sequence() {
        let store = SqliteStore::in_memory().await.unwrap();
        let first = store.push_event("job-1", "submitted", at(0)).await.unwrap();
        let second = store.push_event("job-1", "news ready job-1", at(0)).await.unwrap();
        store.push_event("job-2", "submitted", at(5)).await.unwrap();

        assert!(second.sequence > first.sequence);
        let events = store.events("job-1").await.unwrap();
        assert_eq!(events, vec![first, second]);
        assert_eq!(store.job_ids().await.unwrap(), vec!["job-1", "job-2"]);

        assert_eq!(store.delete_events("job-1").await.unwrap(), 2);
        assert!(store.events("job-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chart_entries_round_trip_urls() {
        let store = SqliteStore::in_memory().await.unwrap();
        let urls = vec!["https://a.example.com".to_string(), "https://b.example.com".to_string()];
        let entry = store.insert_entry("AAPL", &urls, Some("Apple Inc."), at(10)).await.unwrap();

        let entries = store.entries("AAPL").await.unwrap();
        assert_eq!(entries, vec![entry]);
        assert!(store.entries("MSFT").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_news_insert_is_first_writer_wins() {
        let store = SqliteStore::in_memory().await.unwrap();
        let record = NewsRecord::pending("https://n.example.com/1", "Title", "/tmp/a.html", at(0));

        assert!(store.insert_pending(&record).await.unwrap().is_some());
        let again = NewsRecord::pending("https://n.example.com/1", "Other", "/tmp/b.html", at(1));
        assert!(store.insert_pending(&again).await.unwrap().is_none());
        assert_eq!(store.get_record(&record.url).await.unwrap(), Some(record.clone()));

        let update = ArticleUpdate {
            content: "body".into(),
            summary: "short".into(),
            publish_date: "2025-01-01".into(),
        };
        assert!(store.update_article(&record.url, &update).await.unwrap());
        assert!(!store.update_article("https://n.example.com/none", &update).await.unwrap());

        let stored = store.get_record(&record.url).await.unwrap().unwrap();
        assert!(!stored.is_pending());
        assert_eq!(stored.summary, "short");
        assert_eq!(store.all_urls().await.unwrap(), vec![record.url]);
    }

    #[tokio::test]
    async fn test_fragments_newest_first_and_duplicates_kept() {
        let store = SqliteStore::in_memory().await.unwrap();
        let key = FragmentKey::new("https://n.example.com/1", "AAPL");
        for secs in [0, 20, 10] {
            let fragment = Fragment::new(key.clone(), None, "T", Insight::default(), at(secs));
            store.insert_fragment(&fragment).await.unwrap();
        }

        assert!(store.has_fragment(&key).await.unwrap());
        assert!(!store
            .has_fragment(&FragmentKey::new("https://n.example.com/1", "MSFT"))
            .await
            .unwrap());

        let fragments = store.fragments_for_ticker("AAPL", 2).await.unwrap();
        let times: Vec<_> = fragments.iter().map(|f| f.time_created).collect();
        assert_eq!(times, vec![at(20), at(10)]);
    }

    #[tokio::test]
    async fn test_queue_is_fifo_per_name() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.push("a", "1".into()).await.unwrap();
        store.push("b", "x".into()).await.unwrap();
        store.push("a", "2".into()).await.unwrap();

        assert_eq!(store.len("a").await.unwrap(), 2);
        let wait = Duration::from_millis(10);
        assert_eq!(store.pop("a", wait).await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.pop("a", wait).await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.pop("a", wait).await.unwrap(), None);
        assert_eq!(store.len("b").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pop_waits_for_late_push() {
        let store = SqliteStore::in_memory().await.unwrap();
        let producer = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            producer.push("q", "late".into()).await.unwrap();
        });

        let message = store.pop("q", Duration::from_secs(2)).await.unwrap();
        assert_eq!(message.as_deref(), Some("late"));
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/nested.db", dir.path().display());
        {
            let store = SqliteStore::new(&url).await.unwrap();
            store.push_event("job", "submitted", at(0)).await.unwrap();
            store.pool().close().await;
        }
        let reopened = SqliteStore::new(&url).await.unwrap();
        assert_eq!(reopened.events("job").await.unwrap().len(), 1);
    }
}
