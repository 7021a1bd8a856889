use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use crate::ai::openai::DEFAULT_MODEL;
use crate::ai::prompts::{DEFAULT_INSIGHT_PROMPT, DEFAULT_SUMMARY_PROMPT};
use crate::pipeline::PollConfig;
use crate::stages::crawl::DEFAULT_MAX_ARTICLES;
use crate::stages::insight::DEFAULT_CONTENT_LIMIT;
use crate::stages::DEFAULT_DEQUEUE_TIMEOUT;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/news_insights.db?mode=rwc";
pub const DEFAULT_ARCHIVE_DIR: &str = "data/raw_html";

/// Library-side tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub max_articles: usize,
    pub cache_ttl: chrono::Duration,
    pub dequeue_timeout: Duration,
    /// Base spacing between article downloads (jitter is added on top)
    pub download_delay: Duration,
    /// Spacing between summarize calls
    pub summary_delay: Duration,
    pub content_limit: usize,
    pub poll: PollConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_articles: DEFAULT_MAX_ARTICLES,
            cache_ttl: crate::cache::default_ttl(),
            dequeue_timeout: DEFAULT_DEQUEUE_TIMEOUT,
            download_delay: Duration::from_secs(5),
            summary_delay: Duration::from_millis(1000),
            content_limit: DEFAULT_CONTENT_LIMIT,
            poll: PollConfig::default(),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub archive_dir: PathBuf,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub summary_prompt_path: Option<PathBuf>,
    pub insight_prompt_path: Option<PathBuf>,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unset and empty values take the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = PipelineConfig::default();

        let pipeline = PipelineConfig {
            max_articles: parse_or(&get, "MAX_ARTICLES", defaults.max_articles)?,
            cache_ttl: chrono::Duration::try_hours(parse_or(
                &get,
                "CACHE_TTL_HOURS",
                defaults.cache_ttl.num_hours(),
            )?)
            .context("CACHE_TTL_HOURS is out of range")?,
            dequeue_timeout: Duration::from_secs(parse_or(
                &get,
                "DEQUEUE_TIMEOUT_SECS",
                defaults.dequeue_timeout.as_secs(),
            )?),
            download_delay: Duration::from_secs(parse_or(
                &get,
                "DOWNLOAD_DELAY_SECS",
                defaults.download_delay.as_secs(),
            )?),
            summary_delay: Duration::from_millis(parse_or(
                &get,
                "SUMMARY_DELAY_MS",
                defaults.summary_delay.as_millis() as u64,
            )?),
            content_limit: defaults.content_limit,
            poll: PollConfig {
                interval: Duration::from_secs(parse_or(
                    &get,
                    "POLL_INTERVAL_SECS",
                    defaults.poll.interval.as_secs(),
                )?),
                max_attempts: parse_or(&get, "POLL_MAX_ATTEMPTS", defaults.poll.max_attempts)?,
            },
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            archive_dir: get("HTML_ARCHIVE_DIR")
                .unwrap_or_else(|| DEFAULT_ARCHIVE_DIR.to_string())
                .into(),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL"),
            summary_prompt_path: get("SUMMARY_PROMPT_PATH").map(PathBuf::from),
            insight_prompt_path: get("INSIGHT_PROMPT_PATH").map(PathBuf::from),
            pipeline,
        })
    }

    pub fn require_openai_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY must be set to run workers")
    }

    pub fn summary_prompt(&self) -> Result<String> {
        load_prompt(self.summary_prompt_path.as_deref(), DEFAULT_SUMMARY_PROMPT)
    }

    pub fn insight_prompt(&self) -> Result<String> {
        load_prompt(self.insight_prompt_path.as_deref(), DEFAULT_INSIGHT_PROMPT)
    }

    /// Filesystem path of a `sqlite:` database URL, if it names a file.
    pub fn sqlite_file(&self) -> Option<PathBuf> {
        sqlite_file(&self.database_url)
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got {raw:?}")),
        None => Ok(default),
    }
}

fn load_prompt(path: Option<&Path>, default: &str) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file {}", path.display())),
        None => Ok(default.to_string()),
    }
}

fn sqlite_file(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.archive_dir, PathBuf::from("data/raw_html"));
        assert_eq!(config.openai_model, "gpt-5");
        assert!(config.openai_api_key.is_none());
        assert!(config.require_openai_key().is_err());
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.pipeline.cache_ttl, chrono::Duration::hours(24));
        assert_eq!(config.pipeline.poll.max_attempts, 20);
        assert_eq!(config.summary_prompt().unwrap(), DEFAULT_SUMMARY_PROMPT);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("CACHE_TTL_HOURS", "6"),
            ("MAX_ARTICLES", "3"),
            ("SUMMARY_DELAY_MS", "250"),
            ("POLL_MAX_ATTEMPTS", "4"),
            ("OPENAI_BASE_URL", ""),
        ])
        .unwrap();
        assert_eq!(config.require_openai_key().unwrap(), "sk-test");
        assert_eq!(config.pipeline.cache_ttl, chrono::Duration::hours(6));
        assert_eq!(config.pipeline.max_articles, 3);
        assert_eq!(config.pipeline.summary_delay, Duration::from_millis(250));
        assert_eq!(config.pipeline.poll.max_attempts, 4);
        assert!(config.openai_base_url.is_none());
    }

    #[test]
    fn test_cache_ttl_feeds_the_staleness_cache() {
        use crate::cache::StalenessCache;
        use crate::clock::SystemClock;
        use crate::stores::MemoryStore;
        use std::sync::Arc;

        let config = config(&[("CACHE_TTL_HOURS", "2")]).unwrap();
        let cache = StalenessCache::new(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
            .with_ttl(config.pipeline.cache_ttl);
        assert_eq!(cache.ttl(), chrono::Duration::hours(2));
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = config(&[("MAX_ARTICLES", "five")]).unwrap_err();
        assert!(err.to_string().contains("MAX_ARTICLES"));
    }

    #[test]
    fn test_prompt_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insight.txt");
        std::fs::write(&path, "custom instructions").unwrap();
        let config = config(&[("INSIGHT_PROMPT_PATH", path.to_str().unwrap())]).unwrap();
        assert_eq!(config.insight_prompt().unwrap(), "custom instructions");
    }

    #[test]
    fn test_sqlite_file_path() {
        assert_eq!(
            sqlite_file("sqlite://data/news_insights.db?mode=rwc"),
            Some(PathBuf::from("data/news_insights.db"))
        );
        assert_eq!(sqlite_file("sqlite::memory:"), None);
        assert_eq!(sqlite_file("postgres://localhost/db"), None);
    }
}
