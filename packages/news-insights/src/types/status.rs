//! Job status events and their classification.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::job::Stage;

/// Appended when a job enters the crawl queue.
pub const SUBMITTED: &str = "submitted";

/// Appended by the summarize stage after every batch.
pub const SUMMARIES_READY: &str = "summaries ready";

/// Terminal success marker, appended by the insight stage.
pub const INSIGHTS_READY: &str = "insights ready";

/// Reported when a job has no events at all.
pub const UNKNOWN: &str = "unknown";

const NEWS_READY_PREFIX: &str = "news ready ";

/// Appended by the crawl stage once the URL set is known.
pub fn news_ready(job_id: &str) -> String {
    format!("{NEWS_READY_PREFIX}{job_id}")
}

/// Appended by a stage worker when its handler returns an error.
pub fn stage_failed(stage: Stage, reason: impl fmt::Display) -> String {
    format!("{stage} failed: {reason}")
}

fn is_stage_failure(text: &str) -> bool {
    Stage::ALL.iter().any(|stage| {
        text.strip_prefix(stage.as_str())
            .is_some_and(|rest| rest.starts_with(" failed: "))
    })
}

/// One entry in a job's status log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub job_id: String,
    pub status: String,
    pub time: DateTime<Utc>,
    /// Store-assigned, increasing. Breaks timestamp ties.
    pub sequence: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Submitted,
    InProgress,
    Ready,
    Failed,
    Unknown,
}

impl StatusKind {
    /// Classify raw status text against the terminal-success marker.
    ///
    /// Texts the pipeline writes itself are matched by shape before the
    /// keyword fallback. `news ready` embeds caller-chosen identifiers.
    pub fn classify(text: &str, terminal_marker: &str) -> Self {
        if text == terminal_marker {
            return StatusKind::Ready;
        }
        if text == SUBMITTED {
            return StatusKind::Submitted;
        }
        if text == UNKNOWN {
            return StatusKind::Unknown;
        }
        if text.starts_with(NEWS_READY_PREFIX) || text == SUMMARIES_READY {
            return StatusKind::InProgress;
        }
        if is_stage_failure(text) {
            return StatusKind::Failed;
        }
        let lowered = text.to_lowercase();
        if lowered.contains("fail") || lowered.contains("error") {
            StatusKind::Failed
        } else {
            StatusKind::InProgress
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusKind::Ready | StatusKind::Failed)
    }
}

/// Resolved status of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub kind: StatusKind,
    pub text: String,
}

impl JobStatus {
    pub fn unknown() -> Self {
        Self {
            kind: StatusKind::Unknown,
            text: UNKNOWN.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let marker = INSIGHTS_READY;
        assert_eq!(StatusKind::classify(INSIGHTS_READY, marker), StatusKind::Ready);
        assert_eq!(StatusKind::classify(SUBMITTED, marker), StatusKind::Submitted);
        assert_eq!(
            StatusKind::classify(&news_ready("u@s@AAPL@1234abcd"), marker),
            StatusKind::InProgress
        );
        assert_eq!(
            StatusKind::classify("crawl failed: no quote page", marker),
            StatusKind::Failed
        );
        assert_eq!(
            StatusKind::classify("Unexpected ERROR", marker),
            StatusKind::Failed
        );
        assert_eq!(
            StatusKind::classify(&stage_failed(Stage::Insight, "model timed out"), marker),
            StatusKind::Failed
        );
        assert_eq!(StatusKind::classify(SUMMARIES_READY, marker), StatusKind::InProgress);
    }

    #[test]
    fn identifiers_in_job_id_do_not_mark_failure() {
        let marker = INSIGHTS_READY;
        for job_id in [
            "error-bot@failover@AAPL@d1d703b4",
            "alice@s1@FAIL@0badf00d",
            "alice@s1@ERROR@12345678",
        ] {
            assert_eq!(
                StatusKind::classify(&news_ready(job_id), marker),
                StatusKind::InProgress,
                "{job_id}"
            );
        }
    }
}
