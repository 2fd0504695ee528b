//! Read-side projection of a `CrawlJob` that overlays the derived `stalled`
//! status, so callers never have to remember to apply the heartbeat check
//! themselves.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::models::CrawlJob;

#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: Uuid,
    pub source_id: Option<Uuid>,
    pub name: String,
    pub start_urls: Vec<String>,
    pub max_depth: i32,
    pub status: &'static str,
    pub phase: &'static str,
    pub pages_crawled: i64,
    pub pages_skipped_unchanged: i64,
    pub snippets_extracted: i64,
    pub failed_pages: i64,
    pub retry_generation: i32,
    pub error_message: Option<String>,
    pub started_at: Option<chrono::DateTime<Utc>>,
    pub ended_at: Option<chrono::DateTime<Utc>>,
    pub created_at: chrono::DateTime<Utc>,
}

impl JobView {
    pub fn new(job: &CrawlJob, heartbeat_stall_threshold_secs: u64) -> Self {
        let now = Utc::now();
        Self {
            id: job.id,
            source_id: job.source_id,
            name: job.name.clone(),
            start_urls: job.start_urls.clone(),
            max_depth: job.max_depth,
            status: job.display_status(now, heartbeat_stall_threshold_secs),
            phase: job.phase.as_str(),
            pages_crawled: job.pages_crawled,
            pages_skipped_unchanged: job.pages_skipped_unchanged,
            snippets_extracted: job.snippets_extracted,
            failed_pages: job.failed_pages,
            retry_generation: job.retry_generation,
            error_message: job.error_message.clone(),
            started_at: job.started_at,
            ended_at: job.ended_at,
            created_at: job.created_at,
        }
    }
}
