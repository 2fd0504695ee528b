//! `JobManager`: validates job creation, drives CAS lifecycle transitions,
//! and hands running jobs off to the `CrawlScheduler`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use url::Url;
use uuid::Uuid;

use crate::config::Config;
use crate::crawl::filters::AdmissionFilter;
use crate::crawl::scheduler::CrawlScheduler;
use crate::error::{CodeDoxError, Result};
use crate::jobs::view::JobView;
use crate::models::{CrawlJob, JobPhase, JobStatus};
use crate::repository::jobs::NewJob;
use crate::repository::Repositories;

/// Parameters accepted by `create_job`, validated before anything is
/// persisted.
#[derive(Debug, Clone)]
pub struct NewJobParams {
    pub name: String,
    pub start_urls: Vec<String>,
    pub max_depth: i32,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub domain_filter: Option<String>,
    pub max_concurrent_crawls: Option<i32>,
    pub max_pages: Option<i32>,
}

pub struct JobManager {
    repos: Repositories,
    scheduler: Arc<CrawlScheduler>,
    default_max_concurrent_crawls: i32,
    heartbeat_stall_threshold_secs: u64,
    task_cancellation_timeout: Duration,
}

impl JobManager {
    pub fn new(repos: Repositories, scheduler: Arc<CrawlScheduler>, config: &Config) -> Self {
        Self {
            repos,
            scheduler,
            default_max_concurrent_crawls: config.max_concurrent_crawls as i32,
            heartbeat_stall_threshold_secs: config.heartbeat_stall_threshold_secs,
            task_cancellation_timeout: Duration::from_secs(config.task_cancellation_timeout_secs),
        }
    }

    /// Validate and persist a new job in `pending` status. Does not start
    /// it; callers call `start` explicitly (mirroring the HTTP/MCP surface,
    /// where `init_crawl` always returns immediately with a job id).
    pub async fn create_job(&self, params: NewJobParams) -> Result<CrawlJob> {
        if params.start_urls.is_empty() {
            return Err(CodeDoxError::Validation("at least one start URL is required".to_string()));
        }
        for url in &params.start_urls {
            Url::parse(url).map_err(|e| {
                CodeDoxError::Validation(format!("invalid start URL '{url}': {e}"))
            })?;
        }
        if !(0..=3).contains(&params.max_depth) {
            return Err(CodeDoxError::Validation(format!(
                "max_depth must be between 0 and 3, got {}",
                params.max_depth
            )));
        }
        let max_concurrent_crawls = params
            .max_concurrent_crawls
            .unwrap_or(self.default_max_concurrent_crawls);
        if !(1..=100).contains(&max_concurrent_crawls) {
            return Err(CodeDoxError::Validation(format!(
                "max_concurrent_crawls must be between 1 and 100, got {max_concurrent_crawls}"
            )));
        }
        if let Some(max_pages) = params.max_pages {
            if max_pages < 1 {
                return Err(CodeDoxError::Validation("max_pages must be at least 1".to_string()));
            }
        }
        // Compiling the filter here surfaces a bad glob at creation time
        // rather than failing silently mid-crawl.
        AdmissionFilter::new(
            params.domain_filter.clone(),
            &params.include_patterns,
            &params.exclude_patterns,
        )?;

        let base_snippet_count = match self.repos.sources.find_by_name(&params.name, None).await? {
            Some(source) => self.repos.snippets.count_by_source(source.id).await?,
            None => 0,
        };

        self.repos
            .jobs
            .create(NewJob {
                name: params.name,
                start_urls: params.start_urls,
                max_depth: params.max_depth,
                include_patterns: params.include_patterns,
                exclude_patterns: params.exclude_patterns,
                domain_filter: params.domain_filter,
                max_concurrent_crawls,
                max_pages: params.max_pages,
                base_snippet_count,
            })
            .await
    }

    /// Transition a `pending` job to `running` and hand it to the scheduler.
    pub async fn start(&self, id: Uuid) -> Result<CrawlJob> {
        let job = self.repos.jobs.get(id).await?;
        if job.status != JobStatus::Pending {
            return Err(CodeDoxError::Conflict(format!(
                "job {id} is {}, not pending", job.status.as_str()
            )));
        }
        let job = self
            .repos
            .jobs
            .transition(
                id,
                job.version,
                JobStatus::Running,
                Some(JobPhase::Crawling),
                None,
                Some(Utc::now()),
                None,
            )
            .await?;
        self.scheduler.spawn_job(id).await;
        Ok(job)
    }

    /// Request cancellation. A `pending` job is cancelled immediately; a
    /// `running` job is signalled and given up to `task_cancellation_timeout`
    /// to drain before this returns (the pipeline itself performs the final
    /// `running -> cancelled` transition once its workers exit).
    pub async fn cancel(&self, id: Uuid) -> Result<CrawlJob> {
        let job = self.repos.jobs.get(id).await?;
        match job.status {
            JobStatus::Pending => {
                self.repos
                    .jobs
                    .transition(
                        id,
                        job.version,
                        JobStatus::Cancelled,
                        None,
                        None,
                        None,
                        Some(Utc::now()),
                    )
                    .await
            }
            JobStatus::Running => {
                self.scheduler.cancel_job(id).await;
                self.scheduler.wait_for_drain(id, self.task_cancellation_timeout).await;
                self.repos.jobs.get(id).await
            }
            _ => Err(CodeDoxError::Conflict(format!(
                "job {id} is already {}", job.status.as_str()
            ))),
        }
    }

    /// Resume a job stuck in a non-completed terminal state, or one that
    /// reads as `stalled` (running but heartbeat stale). Recomputes the
    /// unfinished-URL frontier by bumping `retry_generation`; the pipeline
    /// picks that up via `initial_frontier`.
    pub async fn resume(&self, id: Uuid) -> Result<CrawlJob> {
        let job = self.repos.jobs.get(id).await?;
        let stalled = job.is_stalled(Utc::now(), self.heartbeat_stall_threshold_secs);
        let resumable = matches!(job.status, JobStatus::Failed | JobStatus::Cancelled) || stalled;
        if !resumable {
            return Err(CodeDoxError::Conflict(format!(
                "job {id} is {} and cannot be resumed", job.status.as_str()
            )));
        }

        let job = self.repos.jobs.prepare_resume(id, job.version).await?;
        let job = self
            .repos
            .jobs
            .transition(
                id,
                job.version,
                JobStatus::Running,
                Some(JobPhase::Crawling),
                None,
                Some(Utc::now()),
                None,
            )
            .await?;
        self.scheduler.spawn_job(id).await;
        Ok(job)
    }

    pub async fn get(&self, id: Uuid) -> Result<CrawlJob> {
        self.repos.jobs.get(id).await
    }

    pub async fn list(&self, status: Option<JobStatus>) -> Result<Vec<CrawlJob>> {
        self.repos.jobs.list(status).await
    }

    pub fn view(&self, job: &CrawlJob) -> JobView {
        JobView::new(job, self.heartbeat_stall_threshold_secs)
    }

    pub async fn heartbeat(&self, id: Uuid) -> Result<()> {
        self.repos.jobs.heartbeat(id).await
    }

    pub async fn update_counters(
        &self,
        id: Uuid,
        delta_pages_crawled: i64,
        delta_pages_skipped_unchanged: i64,
        delta_snippets_extracted: i64,
        delta_failed_pages: i64,
    ) -> Result<()> {
        self.repos
            .jobs
            .accumulate_counters(
                id,
                delta_pages_crawled,
                delta_pages_skipped_unchanged,
                delta_snippets_extracted,
                delta_failed_pages,
            )
            .await
    }

    pub async fn bulk_cancel(&self, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        for &id in ids {
            self.scheduler.cancel_job(id).await;
        }
        self.repos.jobs.bulk_cancel(ids).await
    }

    /// Create, validate, and immediately start a job in one call — the path
    /// used by `init_crawl`, which never exposes a separate "create without
    /// starting" step to its callers.
    pub async fn create_and_start(&self, params: NewJobParams) -> Result<CrawlJob> {
        let job = self.create_job(params).await?;
        self.start(job.id).await
    }

    /// Re-run the most recent job that fed `source_id`, reusing its start
    /// URLs and filters. Fails if the source has never been crawled (an
    /// upload-only or repo source has no prior job to reuse).
    pub async fn recrawl(&self, source_id: Uuid) -> Result<CrawlJob> {
        let prior = self.repos.jobs.find_latest_by_source(source_id).await?.ok_or_else(|| {
            CodeDoxError::NotFound(format!("source {source_id} has no prior crawl job to repeat"))
        })?;
        self.create_and_start(NewJobParams {
            name: prior.name,
            start_urls: prior.start_urls,
            max_depth: prior.max_depth,
            include_patterns: prior.include_patterns,
            exclude_patterns: prior.exclude_patterns,
            domain_filter: prior.domain_filter,
            max_concurrent_crawls: Some(prior.max_concurrent_crawls),
            max_pages: prior.max_pages,
        })
        .await
    }
}
