//! Crawl job repository: creation, listing, and the optimistic-concurrency
//! state transitions the Job Manager drives.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::error::{CodeDoxError, Result};
use crate::models::{CrawlJob, JobPhase, JobStatus};
use crate::schema::crawl_jobs;

use super::pool::DbPool;

#[derive(Clone)]
pub struct JobRepository {
    pool: DbPool,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = crawl_jobs)]
struct JobRow {
    id: Uuid,
    source_id: Option<Uuid>,
    name: String,
    start_urls: Vec<String>,
    max_depth: i32,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    domain_filter: Option<String>,
    max_concurrent_crawls: i32,
    max_pages: Option<i32>,
    status: String,
    phase: String,
    pages_crawled: i64,
    pages_skipped_unchanged: i64,
    snippets_extracted: i64,
    failed_pages: i64,
    base_snippet_count: i64,
    retry_generation: i32,
    version: i32,
    heartbeat_at: chrono::DateTime<Utc>,
    error_message: Option<String>,
    started_at: Option<chrono::DateTime<Utc>>,
    ended_at: Option<chrono::DateTime<Utc>>,
    created_at: chrono::DateTime<Utc>,
}

impl From<JobRow> for CrawlJob {
    fn from(r: JobRow) -> Self {
        CrawlJob {
            id: r.id,
            source_id: r.source_id,
            name: r.name,
            start_urls: r.start_urls,
            max_depth: r.max_depth,
            include_patterns: r.include_patterns,
            exclude_patterns: r.exclude_patterns,
            domain_filter: r.domain_filter,
            max_concurrent_crawls: r.max_concurrent_crawls,
            max_pages: r.max_pages,
            status: JobStatus::from_str(&r.status).unwrap_or(JobStatus::Failed),
            phase: match r.phase.as_str() {
                "extracting" => JobPhase::Extracting,
                "finalizing" => JobPhase::Finalizing,
                _ => JobPhase::Crawling,
            },
            pages_crawled: r.pages_crawled,
            pages_skipped_unchanged: r.pages_skipped_unchanged,
            snippets_extracted: r.snippets_extracted,
            failed_pages: r.failed_pages,
            base_snippet_count: r.base_snippet_count,
            retry_generation: r.retry_generation,
            version: r.version,
            heartbeat_at: r.heartbeat_at,
            error_message: r.error_message,
            started_at: r.started_at,
            ended_at: r.ended_at,
            created_at: r.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = crawl_jobs)]
struct NewJobRow<'a> {
    name: &'a str,
    start_urls: &'a [String],
    max_depth: i32,
    include_patterns: &'a [String],
    exclude_patterns: &'a [String],
    domain_filter: Option<&'a str>,
    max_concurrent_crawls: i32,
    max_pages: Option<i32>,
    base_snippet_count: i64,
}

/// Parameters accepted by `create`, gathered into a struct to avoid an
/// unwieldy positional argument list.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub name: String,
    pub start_urls: Vec<String>,
    pub max_depth: i32,
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub domain_filter: Option<String>,
    pub max_concurrent_crawls: i32,
    pub max_pages: Option<i32>,
    pub base_snippet_count: i64,
}

impl JobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_job: NewJob) -> Result<CrawlJob> {
        let mut conn = self.pool.get().await?;
        let row: JobRow = diesel::insert_into(crawl_jobs::table)
            .values(NewJobRow {
                name: &new_job.name,
                start_urls: &new_job.start_urls,
                max_depth: new_job.max_depth,
                include_patterns: &new_job.include_patterns,
                exclude_patterns: &new_job.exclude_patterns,
                domain_filter: new_job.domain_filter.as_deref(),
                max_concurrent_crawls: new_job.max_concurrent_crawls,
                max_pages: new_job.max_pages,
                base_snippet_count: new_job.base_snippet_count,
            })
            .get_result(&mut conn)
            .await?;
        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<CrawlJob> {
        let mut conn = self.pool.get().await?;
        crawl_jobs::table
            .find(id)
            .select(JobRow::as_select())
            .first(&mut conn)
            .await
            .map(Into::into)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    CodeDoxError::NotFound(format!("job {id} not found"))
                }
                other => other.into(),
            })
    }

    pub async fn list(&self, status: Option<JobStatus>) -> Result<Vec<CrawlJob>> {
        let mut conn = self.pool.get().await?;
        let mut query = crawl_jobs::table.into_boxed();
        if let Some(status) = status {
            query = query.filter(crawl_jobs::status.eq(status.as_str()));
        }
        let rows = query
            .select(JobRow::as_select())
            .order(crawl_jobs::created_at.desc())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Most recently created job that attached `source_id`, used by
    /// `recrawl` to reuse a prior job's start URLs and filters.
    pub async fn find_latest_by_source(&self, source_id: Uuid) -> Result<Option<CrawlJob>> {
        let mut conn = self.pool.get().await?;
        let row = crawl_jobs::table
            .filter(crawl_jobs::source_id.eq(source_id))
            .select(JobRow::as_select())
            .order(crawl_jobs::created_at.desc())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Into::into))
    }

    /// Attach the resolved source once the first document has been written.
    pub async fn attach_source(&self, id: Uuid, source_id: Uuid) -> Result<()> {
        let mut conn = self.pool.get().await?;
        diesel::update(crawl_jobs::table.find(id))
            .set(crawl_jobs::source_id.eq(source_id))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Compare-and-swap state transition. Fails with `ConflictError` if
    /// `expected_version` does not match the stored version (another writer
    /// raced this one), satisfying the Job Manager's single-writer
    /// discipline without a database-level lock.
    #[allow(clippy::too_many_arguments)]
    pub async fn transition(
        &self,
        id: Uuid,
        expected_version: i32,
        status: JobStatus,
        phase: Option<JobPhase>,
        error_message: Option<String>,
        started_at: Option<chrono::DateTime<Utc>>,
        ended_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<CrawlJob> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now();

        let rows_updated = {
            // The error/phase/started/ended fields are applied with
            // dedicated statements guarded by the id, since the first
            // statement already consumed the CAS predicate; all run in one
            // transaction so the update is atomic.
            conn.build_transaction()
                .run(|tx| {
                    Box::pin(async move {
                        let mut updated = diesel::update(
                            crawl_jobs::table
                                .filter(crawl_jobs::id.eq(id))
                                .filter(crawl_jobs::version.eq(expected_version)),
                        )
                        .set((
                            crawl_jobs::status.eq(status.as_str()),
                            crawl_jobs::version.eq(expected_version + 1),
                            crawl_jobs::heartbeat_at.eq(now),
                        ))
                        .execute(tx)
                        .await?;

                        if updated == 0 {
                            return Ok::<_, diesel::result::Error>(0);
                        }

                        if let Some(phase) = phase {
                            diesel::update(crawl_jobs::table.find(id))
                                .set(crawl_jobs::phase.eq(phase.as_str()))
                                .execute(tx)
                                .await?;
                        }
                        if let Some(msg) = &error_message {
                            diesel::update(crawl_jobs::table.find(id))
                                .set(crawl_jobs::error_message.eq(msg))
                                .execute(tx)
                                .await?;
                        }
                        if let Some(started_at) = started_at {
                            diesel::update(crawl_jobs::table.find(id))
                                .set(crawl_jobs::started_at.eq(started_at))
                                .execute(tx)
                                .await?;
                        }
                        if let Some(ended_at) = ended_at {
                            diesel::update(crawl_jobs::table.find(id))
                                .set(crawl_jobs::ended_at.eq(ended_at))
                                .execute(tx)
                                .await?;
                        }
                        updated = 1;
                        Ok(updated)
                    })
                })
                .await?
        };

        if rows_updated == 0 {
            return Err(CodeDoxError::Conflict(format!(
                "job {id} was modified by another writer; reload and retry"
            )));
        }

        self.get(id).await
    }

    /// Accumulate counters atomically; does not touch `version` since this
    /// isn't a state transition, just progress bookkeeping.
    pub async fn accumulate_counters(
        &self,
        id: Uuid,
        delta_pages_crawled: i64,
        delta_pages_skipped_unchanged: i64,
        delta_snippets_extracted: i64,
        delta_failed_pages: i64,
    ) -> Result<()> {
        let mut conn = self.pool.get().await?;
        diesel::update(crawl_jobs::table.find(id))
            .set((
                crawl_jobs::pages_crawled.eq(crawl_jobs::pages_crawled + delta_pages_crawled),
                crawl_jobs::pages_skipped_unchanged
                    .eq(crawl_jobs::pages_skipped_unchanged + delta_pages_skipped_unchanged),
                crawl_jobs::snippets_extracted
                    .eq(crawl_jobs::snippets_extracted + delta_snippets_extracted),
                crawl_jobs::failed_pages.eq(crawl_jobs::failed_pages + delta_failed_pages),
                crawl_jobs::heartbeat_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn heartbeat(&self, id: Uuid) -> Result<()> {
        let mut conn = self.pool.get().await?;
        diesel::update(crawl_jobs::table.find(id))
            .set(crawl_jobs::heartbeat_at.eq(Utc::now()))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    /// Bump `retry_generation` and reset the terminal status to `pending`
    /// for a resume. Only valid from a terminal, non-completed state;
    /// callers (`jobs::manager`) enforce that precondition.
    pub async fn prepare_resume(&self, id: Uuid, expected_version: i32) -> Result<CrawlJob> {
        let mut conn = self.pool.get().await?;
        let updated = diesel::update(
            crawl_jobs::table
                .filter(crawl_jobs::id.eq(id))
                .filter(crawl_jobs::version.eq(expected_version)),
        )
        .set((
            crawl_jobs::status.eq(JobStatus::Pending.as_str()),
            crawl_jobs::phase.eq(JobPhase::Crawling.as_str()),
            crawl_jobs::retry_generation.eq(crawl_jobs::retry_generation + 1),
            crawl_jobs::version.eq(expected_version + 1),
            crawl_jobs::error_message.eq(None::<String>),
            crawl_jobs::ended_at.eq(None::<chrono::DateTime<Utc>>),
            crawl_jobs::heartbeat_at.eq(Utc::now()),
        ))
        .execute(&mut conn)
        .await?;

        if updated == 0 {
            return Err(CodeDoxError::Conflict(format!(
                "job {id} was modified by another writer; reload and retry"
            )));
        }
        self.get(id).await
    }

    /// Cancel every job not already in a terminal state. Returns the ids
    /// actually cancelled.
    pub async fn bulk_cancel(&self, ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let mut conn = self.pool.get().await?;
        let terminal = [
            JobStatus::Completed.as_str(),
            JobStatus::Failed.as_str(),
            JobStatus::Cancelled.as_str(),
        ];

        let rows: Vec<JobRow> = diesel::update(
            crawl_jobs::table
                .filter(crawl_jobs::id.eq_any(ids))
                .filter(crawl_jobs::status.ne_all(terminal)),
        )
        .set((
            crawl_jobs::status.eq(JobStatus::Cancelled.as_str()),
            crawl_jobs::ended_at.eq(Utc::now()),
            crawl_jobs::version.eq(crawl_jobs::version + 1),
        ))
        .get_results(&mut conn)
        .await?;

        Ok(rows.into_iter().map(|r| r.id).collect())
    }
}
