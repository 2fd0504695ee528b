//! Document repository: upsert with skip-on-unchanged, page lookup.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::error::{CodeDoxError, Result};
use crate::models::Document;
use crate::schema::documents;

use super::pool::DbPool;

#[derive(Clone)]
pub struct DocumentRepository {
    pool: DbPool,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = documents)]
struct DocumentRow {
    id: Uuid,
    source_id: Uuid,
    url: String,
    title: String,
    crawl_depth: i32,
    content_hash: String,
    markdown: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(r: DocumentRow) -> Self {
        Document {
            id: r.id,
            source_id: r.source_id,
            url: r.url,
            title: r.title,
            crawl_depth: r.crawl_depth,
            content_hash: r.content_hash,
            markdown: r.markdown,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = documents)]
struct DocumentUpsert<'a> {
    source_id: Uuid,
    url: &'a str,
    title: &'a str,
    crawl_depth: i32,
    content_hash: &'a str,
    markdown: Option<&'a str>,
    updated_at: chrono::DateTime<Utc>,
}

/// Result of an upsert, so callers (the crawl pipeline) know whether to
/// proceed to extraction or record a skip.
pub enum UpsertOutcome {
    /// Content hash matched the stored document; nothing was written.
    Unchanged(Document),
    /// Document was inserted or its content changed.
    Changed(Document),
}

impl DocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert or update a document by `(source_id, url)`. If the incoming
    /// `content_hash` matches what's stored, the row (and its snippets) are
    /// left untouched and `Unchanged` is returned so the pipeline can skip
    /// re-extraction.
    pub async fn upsert(
        &self,
        source_id: Uuid,
        url: &str,
        title: &str,
        crawl_depth: i32,
        content_hash: &str,
        markdown: Option<&str>,
    ) -> Result<UpsertOutcome> {
        let mut conn = self.pool.get().await?;

        let existing = documents::table
            .filter(documents::source_id.eq(source_id))
            .filter(documents::url.eq(url))
            .select(DocumentRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        if let Some(row) = &existing {
            if row.content_hash == content_hash {
                return Ok(UpsertOutcome::Unchanged(row.clone().into()));
            }
        }

        let now = Utc::now();
        let values = DocumentUpsert {
            source_id,
            url,
            title,
            crawl_depth,
            content_hash,
            markdown,
            updated_at: now,
        };

        let row: DocumentRow = diesel::insert_into(documents::table)
            .values(&values)
            .on_conflict((documents::source_id, documents::url))
            .do_update()
            .set(&values)
            .get_result(&mut conn)
            .await?;

        Ok(UpsertOutcome::Changed(row.into()))
    }

    pub async fn get(&self, id: Uuid) -> Result<Document> {
        let mut conn = self.pool.get().await?;
        documents::table
            .find(id)
            .select(DocumentRow::as_select())
            .first(&mut conn)
            .await
            .map(Into::into)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    CodeDoxError::NotFound(format!("document {id} not found"))
                }
                other => other.into(),
            })
    }

    /// Looks up a document by URL alone, used by `get_page_markdown` which
    /// is not given a source to scope the lookup. When the same URL was
    /// crawled under more than one source, the most recently updated wins.
    pub async fn find_by_url(&self, url: &str) -> Result<Document> {
        let mut conn = self.pool.get().await?;
        documents::table
            .filter(documents::url.eq(url))
            .select(DocumentRow::as_select())
            .order(documents::updated_at.desc())
            .first(&mut conn)
            .await
            .map(Into::into)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    CodeDoxError::NotFound(format!("no document at '{url}'"))
                }
                other => other.into(),
            })
    }

    pub async fn get_by_url(&self, source_id: Uuid, url: &str) -> Result<Document> {
        let mut conn = self.pool.get().await?;
        documents::table
            .filter(documents::source_id.eq(source_id))
            .filter(documents::url.eq(url))
            .select(DocumentRow::as_select())
            .first(&mut conn)
            .await
            .map(Into::into)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    CodeDoxError::NotFound(format!("no document at '{url}' for source {source_id}"))
                }
                other => other.into(),
            })
    }

    /// The stored markdown for a page, used by `get_page_markdown`.
    pub async fn get_markdown(&self, document_id: Uuid) -> Result<(Document, String)> {
        let doc = self.get(document_id).await?;
        let markdown = doc.markdown.clone().ok_or_else(|| {
            CodeDoxError::NotFound(format!("document {document_id} has no stored markdown"))
        })?;
        Ok((doc, markdown))
    }

    pub async fn list_by_source(&self, source_id: Uuid) -> Result<Vec<Document>> {
        let mut conn = self.pool.get().await?;
        let rows = documents::table
            .filter(documents::source_id.eq(source_id))
            .select(DocumentRow::as_select())
            .order(documents::url.asc())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn count_by_source(&self, source_id: Uuid) -> Result<i64> {
        let mut conn = self.pool.get().await?;
        let count = documents::table
            .filter(documents::source_id.eq(source_id))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(count)
    }
}

impl Clone for DocumentRow {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            source_id: self.source_id,
            url: self.url.clone(),
            title: self.title.clone(),
            crawl_depth: self.crawl_depth,
            content_hash: self.content_hash.clone(),
            markdown: self.markdown.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
