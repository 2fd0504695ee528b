//! Failed page repository: one row per URL a crawl could not ingest.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::error::Result;
use crate::models::FailedPage;
use crate::schema::failed_pages;

use super::pool::DbPool;

#[derive(Clone)]
pub struct FailedPageRepository {
    pool: DbPool,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = failed_pages)]
struct FailedPageRow {
    id: Uuid,
    job_id: Uuid,
    url: String,
    error_message: String,
    failed_at: chrono::DateTime<Utc>,
    retry_generation: i32,
}

impl From<FailedPageRow> for FailedPage {
    fn from(r: FailedPageRow) -> Self {
        FailedPage {
            id: r.id,
            job_id: r.job_id,
            url: r.url,
            error_message: r.error_message,
            failed_at: r.failed_at,
            retry_generation: r.retry_generation,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = failed_pages)]
struct NewFailedPageRow<'a> {
    job_id: Uuid,
    url: &'a str,
    error_message: &'a str,
    retry_generation: i32,
}

impl FailedPageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        job_id: Uuid,
        url: &str,
        error_message: &str,
        retry_generation: i32,
    ) -> Result<FailedPage> {
        let mut conn = self.pool.get().await?;
        let row: FailedPageRow = diesel::insert_into(failed_pages::table)
            .values(NewFailedPageRow {
                job_id,
                url,
                error_message,
                retry_generation,
            })
            .get_result(&mut conn)
            .await?;
        Ok(row.into())
    }

    pub async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<FailedPage>> {
        let mut conn = self.pool.get().await?;
        let rows = failed_pages::table
            .filter(failed_pages::job_id.eq(job_id))
            .select(FailedPageRow::as_select())
            .order(failed_pages::failed_at.asc())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// The most recent retry generation's failed URLs, used by resume to
    /// recompute the unfinished-URL set without retrying pages that already
    /// succeeded on an earlier attempt.
    pub async fn urls_failed_at_generation(&self, job_id: Uuid, retry_generation: i32) -> Result<Vec<String>> {
        let mut conn = self.pool.get().await?;
        let urls = failed_pages::table
            .filter(failed_pages::job_id.eq(job_id))
            .filter(failed_pages::retry_generation.eq(retry_generation))
            .select(failed_pages::url)
            .load(&mut conn)
            .await?;
        Ok(urls)
    }

    pub async fn count_for_job(&self, job_id: Uuid) -> Result<i64> {
        let mut conn = self.pool.get().await?;
        let count = failed_pages::table
            .filter(failed_pages::job_id.eq(job_id))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(count)
    }
}
