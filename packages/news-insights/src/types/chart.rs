use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One successful quote-page download for a ticker.
///
/// Entries are append-only; the newest one is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartEntry {
    /// Store-assigned sequence, used as a tie-break on equal timestamps.
    pub id: i64,
    pub ticker: String,
    /// Candidate article URLs found on the page.
    pub urls: Vec<String>,
    /// Organization name shown on the page, if any.
    pub org: Option<String>,
    pub created_at: DateTime<Utc>,
}
