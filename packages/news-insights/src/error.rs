//! Typed errors for the pipeline library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so stage workers can
//! tell job-fatal failures from per-article ones.

use thiserror::Error;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Queue push or pop failed
    #[error("queue error: {0}")]
    Queue(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// HTTP fetch failed
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The aggregation page for a ticker produced no output
    #[error("no quote page for {ticker}: {reason}")]
    ChartUnavailable { ticker: String, reason: String },

    /// Archived HTML missing or no article text could be extracted
    #[error("content unavailable: {url}")]
    ContentUnavailable { url: String },

    /// News record disappeared between read and update
    #[error("news record not found: {url}")]
    RecordNotFound { url: String },

    /// AI service unavailable, timed out or returned garbage
    #[error("AI service error: {0}")]
    Ai(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("invalid job id: {0}")]
    InvalidJobId(String),

    #[error("invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("session needs a non-empty user id and session id")]
    InvalidSession,

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Wrap any error as a storage failure.
    pub fn storage(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage(err.into())
    }

    /// Wrap any error as a queue failure.
    pub fn queue(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Queue(err.into())
    }

    /// The whole job stops here; retrying the same job would not help.
    pub fn is_fatal_to_job(&self) -> bool {
        matches!(
            self,
            Self::ChartUnavailable { .. }
                | Self::InvalidJobId(_)
                | Self::InvalidTicker(_)
                | Self::InvalidSession
        )
    }

    /// Infrastructure failures. Workers surface these instead of skipping
    /// the item that hit them.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Queue(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for PipelineError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(Box::new(err))
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
