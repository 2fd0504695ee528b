//! CrawlJob lifecycle record.
//!
//! `stalled` is derived, not persisted: the Job Manager reports a `running`
//! job as stalled to clients when its heartbeat has aged past the
//! configured threshold, per the state machine in the specification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Terminal states never transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Crawling,
    Extracting,
    Finalizing,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crawling => "crawling",
            Self::Extracting => "extracting",
            Self::Finalizing => "finalizing",
        }
    }
}

/// Lifecycle record for one ingest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub id: Uuid,
    /// Nullable until the first document is written.
    pub source_id: Option<Uuid>,
    pub name: String,
    pub start_urls: Vec<String>,
    pub max_depth: i32,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub domain_filter: Option<String>,
    pub max_concurrent_crawls: i32,
    pub max_pages: Option<i32>,
    pub status: JobStatus,
    pub phase: JobPhase,
    pub pages_crawled: i64,
    pub pages_skipped_unchanged: i64,
    pub snippets_extracted: i64,
    pub failed_pages: i64,
    /// Snapshot of the reused source's snippet count taken at job start.
    pub base_snippet_count: i64,
    pub retry_generation: i32,
    /// Optimistic concurrency token; bumped on every transition.
    pub version: i32,
    pub heartbeat_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CrawlJob {
    /// Whether this job should be reported as `stalled` to clients, given
    /// `now` and the configured threshold. Does not mutate `status`.
    pub fn is_stalled(&self, now: DateTime<Utc>, threshold_secs: u64) -> bool {
        self.status == JobStatus::Running
            && (now - self.heartbeat_at).num_seconds() > threshold_secs as i64
    }

    /// Effective status shown to clients: `stalled` overlays `running`.
    pub fn display_status(&self, now: DateTime<Utc>, threshold_secs: u64) -> &'static str {
        if self.is_stalled(now, threshold_secs) {
            "stalled"
        } else {
            self.status.as_str()
        }
    }
}
