//! Snippet repository: batch replace, duplicate lookup, full-text search.

use chrono::Utc;
use diesel::sql_types::{Array, BigInt, Integer, Nullable, Text};
use diesel::prelude::*;
use diesel::QueryableByName;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::error::Result;
use crate::models::CodeSnippet;
use crate::schema::snippets;

use super::pool::DbPool;

#[derive(Clone)]
pub struct SnippetRepository {
    pool: DbPool,
}

#[derive(Queryable, Selectable, Clone)]
#[diesel(table_name = snippets)]
struct SnippetRow {
    id: Uuid,
    document_id: Uuid,
    language: String,
    code: String,
    title: String,
    description: String,
    filename_hint: Option<String>,
    hierarchy: Vec<String>,
    line_start: i32,
    line_end: i32,
    code_hash: String,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

impl From<SnippetRow> for CodeSnippet {
    fn from(r: SnippetRow) -> Self {
        CodeSnippet {
            id: r.id,
            document_id: r.document_id,
            language: r.language,
            code: r.code,
            title: r.title,
            description: r.description,
            filename_hint: r.filename_hint,
            hierarchy: r.hierarchy,
            line_span: (r.line_start, r.line_end),
            code_hash: r.code_hash,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = snippets)]
struct NewSnippetRow<'a> {
    document_id: Uuid,
    language: &'a str,
    code: &'a str,
    title: &'a str,
    description: &'a str,
    filename_hint: Option<&'a str>,
    hierarchy: &'a [String],
    line_start: i32,
    line_end: i32,
    code_hash: &'a str,
}

/// Filters accepted by `search_snippets`, mirroring the MCP/HTTP `search`
/// surface.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub source_id: Option<Uuid>,
    pub language: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(QueryableByName)]
struct RankedSnippetRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: Uuid,
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    document_id: Uuid,
    #[diesel(sql_type = Text)]
    language: String,
    #[diesel(sql_type = Text)]
    code: String,
    #[diesel(sql_type = Text)]
    title: String,
    #[diesel(sql_type = Text)]
    description: String,
    #[diesel(sql_type = Nullable<Text>)]
    filename_hint: Option<String>,
    #[diesel(sql_type = Array<Text>)]
    hierarchy: Vec<String>,
    #[diesel(sql_type = Integer)]
    line_start: i32,
    #[diesel(sql_type = Integer)]
    line_end: i32,
    #[diesel(sql_type = Text)]
    code_hash: String,
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    created_at: chrono::DateTime<Utc>,
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    updated_at: chrono::DateTime<Utc>,
}

impl From<RankedSnippetRow> for CodeSnippet {
    fn from(r: RankedSnippetRow) -> Self {
        CodeSnippet {
            id: r.id,
            document_id: r.document_id,
            language: r.language,
            code: r.code,
            title: r.title,
            description: r.description,
            filename_hint: r.filename_hint,
            hierarchy: r.hierarchy,
            line_span: (r.line_start, r.line_end),
            code_hash: r.code_hash,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

impl SnippetRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Atomically replace all snippets for a document: delete then insert,
    /// collapsing intra-batch `code_hash` duplicates by keeping the first
    /// occurrence (matches the unique `(document_id, code_hash)` constraint).
    pub async fn replace_for_document(
        &self,
        document_id: Uuid,
        blocks: &[crate::models::CodeSnippet],
    ) -> Result<usize> {
        let mut seen = std::collections::HashSet::new();
        let deduped: Vec<&crate::models::CodeSnippet> = blocks
            .iter()
            .filter(|b| seen.insert(b.code_hash.clone()))
            .collect();

        let mut conn = self.pool.get().await?;
        conn.build_transaction()
            .run(|tx| {
                Box::pin(async move {
                    diesel::delete(snippets::table.filter(snippets::document_id.eq(document_id)))
                        .execute(tx)
                        .await?;

                    if !deduped.is_empty() {
                        let rows: Vec<NewSnippetRow> = deduped
                            .iter()
                            .map(|b| NewSnippetRow {
                                document_id,
                                language: &b.language,
                                code: &b.code,
                                title: &b.title,
                                description: &b.description,
                                filename_hint: b.filename_hint.as_deref(),
                                hierarchy: &b.hierarchy,
                                line_start: b.line_span.0,
                                line_end: b.line_span.1,
                                code_hash: &b.code_hash,
                            })
                            .collect();
                        diesel::insert_into(snippets::table)
                            .values(rows)
                            .execute(tx)
                            .await?;
                    }
                    Ok::<_, diesel::result::Error>(())
                })
            })
            .await?;

        Ok(deduped.len())
    }

    pub async fn find_duplicate_in_document(
        &self,
        document_id: Uuid,
        code_hash: &str,
    ) -> Result<Option<CodeSnippet>> {
        let mut conn = self.pool.get().await?;
        let row = snippets::table
            .filter(snippets::document_id.eq(document_id))
            .filter(snippets::code_hash.eq(code_hash))
            .select(SnippetRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Into::into))
    }

    pub async fn get(&self, id: Uuid) -> Result<CodeSnippet> {
        let mut conn = self.pool.get().await?;
        snippets::table
            .find(id)
            .select(SnippetRow::as_select())
            .first(&mut conn)
            .await
            .map(Into::into)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    crate::error::CodeDoxError::NotFound(format!("snippet {id} not found"))
                }
                other => other.into(),
            })
    }

    /// Snippet count for one document, used by the crawl pipeline to credit
    /// `snippets_extracted` when a page is skipped as unchanged.
    pub async fn count_by_document(&self, document_id: Uuid) -> Result<i64> {
        let mut conn = self.pool.get().await?;
        let count = snippets::table
            .filter(snippets::document_id.eq(document_id))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(count)
    }

    pub async fn count_by_source(&self, source_id: Uuid) -> Result<i64> {
        let mut conn = self.pool.get().await?;
        let row: CountRow = diesel::sql_query(
            "SELECT COUNT(s.*) AS count FROM snippets s \
             JOIN documents d ON d.id = s.document_id \
             WHERE d.source_id = $1",
        )
        .bind::<diesel::sql_types::Uuid, _>(source_id)
        .get_result(&mut conn)
        .await?;
        Ok(row.count)
    }

    /// Most recently updated snippets for a source, used by `get_content`
    /// when no query is given.
    pub async fn recent_by_source(
        &self,
        source_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CodeSnippet>, i64)> {
        let mut conn = self.pool.get().await?;

        let total = self.count_by_source(source_id).await?;

        let rows: Vec<SnippetRow> = snippets::table
            .filter(
                snippets::document_id.eq_any(
                    crate::schema::documents::table
                        .filter(crate::schema::documents::source_id.eq(source_id))
                        .select(crate::schema::documents::id),
                ),
            )
            .select(SnippetRow::as_select())
            .order(snippets::updated_at.desc())
            .limit(limit.max(1))
            .offset(offset.max(0))
            .load(&mut conn)
            .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Ranked full-text search across title (A), description (B), code (C)
    /// weights, scoped by source and/or language. Ties break by the owning
    /// document's `updated_at` (newest first), then snippet id, for stable
    /// pagination. Filters are passed as nullable binds so the query plan
    /// doesn't need to be assembled dynamically.
    pub async fn search(&self, query: &str, filters: &SearchFilters) -> Result<(Vec<CodeSnippet>, i64)> {
        let mut conn = self.pool.get().await?;

        const WHERE_SQL: &str = "s.search_vector @@ websearch_to_tsquery('english', $1) \
            AND ($2::uuid IS NULL OR d.source_id = $2) \
            AND ($3::text IS NULL OR s.language = $3)";

        let total: CountRow = diesel::sql_query(format!(
            "SELECT COUNT(s.*) AS count FROM snippets s \
             JOIN documents d ON d.id = s.document_id \
             WHERE {WHERE_SQL}"
        ))
        .bind::<Text, _>(query)
        .bind::<Nullable<diesel::sql_types::Uuid>, _>(filters.source_id)
        .bind::<Nullable<Text>, _>(filters.language.clone())
        .get_result(&mut conn)
        .await?;

        let rows: Vec<RankedSnippetRow> = diesel::sql_query(format!(
            "SELECT s.id, s.document_id, s.language, s.code, s.title, s.description, \
                    s.filename_hint, s.hierarchy, s.line_start, s.line_end, s.code_hash, \
                    s.created_at, s.updated_at \
             FROM snippets s \
             JOIN documents d ON d.id = s.document_id \
             WHERE {WHERE_SQL} \
             ORDER BY ts_rank_cd(s.search_vector, websearch_to_tsquery('english', $1)) DESC, \
                      d.updated_at DESC, s.id ASC \
             LIMIT $4 OFFSET $5"
        ))
        .bind::<Text, _>(query)
        .bind::<Nullable<diesel::sql_types::Uuid>, _>(filters.source_id)
        .bind::<Nullable<Text>, _>(filters.language.clone())
        .bind::<BigInt, _>(filters.limit.max(1))
        .bind::<BigInt, _>(filters.offset.max(0))
        .load(&mut conn)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total.count))
    }

    pub async fn delete_by_source(&self, source_id: Uuid) -> Result<u64> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel::sql_query(
            "DELETE FROM snippets WHERE document_id IN (SELECT id FROM documents WHERE source_id = $1)",
        )
        .bind::<diesel::sql_types::Uuid, _>(source_id)
        .execute(&mut conn)
        .await?;
        Ok(deleted as u64)
    }

    /// Every snippet belonging to a source, oldest first, for `regenerate`
    /// to walk in a stable order.
    pub async fn list_by_source(&self, source_id: Uuid) -> Result<Vec<CodeSnippet>> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<SnippetRow> = snippets::table
            .filter(
                snippets::document_id.eq_any(
                    crate::schema::documents::table
                        .filter(crate::schema::documents::source_id.eq(source_id))
                        .select(crate::schema::documents::id),
                ),
            )
            .select(SnippetRow::as_select())
            .order(snippets::created_at.asc())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Update the annotator-derived fields of one snippet in place.
    /// `code`/`code_hash`/`id` are never touched, per the regenerate
    /// contract: only language/title/description may change.
    pub async fn update_metadata(
        &self,
        id: Uuid,
        language: &str,
        title: &str,
        description: &str,
    ) -> Result<CodeSnippet> {
        let mut conn = self.pool.get().await?;
        let row: SnippetRow = diesel::update(snippets::table.find(id))
            .set((
                snippets::language.eq(language),
                snippets::title.eq(title),
                snippets::description.eq(description),
                snippets::updated_at.eq(Utc::now()),
            ))
            .get_result(&mut conn)
            .await?;
        Ok(row.into())
    }
}
