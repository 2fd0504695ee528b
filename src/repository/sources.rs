//! Source repository: creation, rename, lookup, and library resolution.

use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::error::{CodeDoxError, Result};
use crate::models::{Source, SourceKind};
use crate::schema::sources;

use super::pool::DbPool;

#[derive(Clone)]
pub struct SourceRepository {
    pool: DbPool,
}

#[derive(Insertable)]
#[diesel(table_name = sources)]
struct NewSourceRow<'a> {
    name: &'a str,
    version: Option<&'a str>,
    base_url: Option<&'a str>,
    kind: &'a str,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = sources)]
struct SourceRow {
    id: Uuid,
    name: String,
    version: Option<String>,
    base_url: Option<String>,
    kind: String,
    created_at: chrono::DateTime<Utc>,
}

impl From<SourceRow> for Source {
    fn from(r: SourceRow) -> Self {
        Source {
            id: r.id,
            name: r.name,
            version: r.version,
            base_url: r.base_url,
            kind: SourceKind::from_str(&r.kind).unwrap_or(SourceKind::Crawl),
            created_at: r.created_at,
        }
    }
}

impl SourceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Lookup-only counterpart to `get_or_create`, used by job creation to
    /// snapshot `base_snippet_count` without prematurely creating a source
    /// that the crawl might never successfully write a document for.
    pub async fn find_by_name(&self, name: &str, version: Option<&str>) -> Result<Option<Source>> {
        let mut conn = self.pool.get().await?;
        let row = sources::table
            .filter(sources::name.eq(name))
            .filter(sources::version.is_not_distinct_from(version))
            .select(SourceRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(row.map(Into::into))
    }

    /// Get an existing `(name, version)` source or create it. Used both by
    /// the crawl pipeline (first document write) and explicitly for upload.
    pub async fn get_or_create(
        &self,
        name: &str,
        version: Option<&str>,
        base_url: Option<&str>,
        kind: SourceKind,
    ) -> Result<Source> {
        let mut conn = self.pool.get().await?;

        let existing = sources::table
            .filter(sources::name.eq(name))
            .filter(sources::version.is_not_distinct_from(version))
            .select(SourceRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;

        if let Some(row) = existing {
            return Ok(row.into());
        }

        let row = diesel::insert_into(sources::table)
            .values(NewSourceRow {
                name,
                version,
                base_url,
                kind: kind.as_str(),
            })
            .get_result::<SourceRow>(&mut conn)
            .await?;

        Ok(row.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<Source> {
        let mut conn = self.pool.get().await?;
        sources::table
            .find(id)
            .select(SourceRow::as_select())
            .first(&mut conn)
            .await
            .map(Into::into)
            .map_err(|e| match e {
                diesel::result::Error::NotFound => {
                    CodeDoxError::NotFound(format!("source {id} not found"))
                }
                other => other.into(),
            })
    }

    pub async fn list(&self) -> Result<Vec<Source>> {
        let mut conn = self.pool.get().await?;
        let rows = sources::table
            .select(SourceRow::as_select())
            .order(sources::created_at.desc())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Resolve `library_id` as either a UUID or a case-insensitive exact
    /// name match, falling back to the nearest unique name prefix.
    pub async fn resolve_library(&self, library_id: &str) -> Result<Source> {
        if let Ok(id) = Uuid::parse_str(library_id) {
            return self.get(id).await;
        }

        let mut conn = self.pool.get().await?;
        let lowered = library_id.to_lowercase();

        let exact = sources::table
            .filter(diesel::dsl::sql::<diesel::sql_types::Bool>(&format!(
                "lower(name) = '{}'",
                lowered.replace('\'', "''")
            )))
            .select(SourceRow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        if let Some(row) = exact {
            return Ok(row.into());
        }

        let mut prefix_matches: Vec<SourceRow> = sources::table
            .select(SourceRow::as_select())
            .load(&mut conn)
            .await?
            .into_iter()
            .filter(|r| r.name.to_lowercase().starts_with(&lowered))
            .collect();

        match prefix_matches.len() {
            1 => Ok(prefix_matches.remove(0).into()),
            0 => Err(CodeDoxError::NotFound(format!(
                "no library matching '{library_id}'"
            ))),
            _ => Err(CodeDoxError::Conflict(format!(
                "'{library_id}' matches more than one library; use its id"
            ))),
        }
    }

    /// Case-insensitive substring + token-prefix match against name/version,
    /// used by `search_libraries`.
    pub async fn search(&self, query: &str) -> Result<Vec<Source>> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<SourceRow> = sources::table
            .select(SourceRow::as_select())
            .load(&mut conn)
            .await?;

        let q = query.to_lowercase();
        let mut matches: Vec<(i32, SourceRow)> = rows
            .into_iter()
            .filter_map(|r| {
                let name_lower = r.name.to_lowercase();
                let version_lower = r.version.as_deref().unwrap_or("").to_lowercase();
                if name_lower == q {
                    Some((0, r))
                } else if name_lower.starts_with(&q) {
                    Some((1, r))
                } else if name_lower.contains(&q) || version_lower.contains(&q) {
                    Some((2, r))
                } else {
                    None
                }
            })
            .collect();
        matches.sort_by_key(|(rank, _)| *rank);
        Ok(matches.into_iter().map(|(_, r)| r.into()).collect())
    }

    /// Rename (and/or re-version) a source, preserving documents/snippets.
    /// Fails with `ConflictError` (leaving state unchanged) if the new
    /// `(name, version)` collides with another source.
    pub async fn rename(
        &self,
        id: Uuid,
        name: &str,
        version: Option<&str>,
    ) -> Result<Source> {
        let mut conn = self.pool.get().await?;

        let collision = sources::table
            .filter(sources::name.eq(name))
            .filter(sources::version.is_not_distinct_from(version))
            .filter(sources::id.ne(id))
            .select(sources::id)
            .first::<Uuid>(&mut conn)
            .await
            .optional()?;
        if collision.is_some() {
            return Err(CodeDoxError::Conflict(format!(
                "a source named '{name}' (version {version:?}) already exists"
            )));
        }

        let row = diesel::update(sources::table.find(id))
            .set((sources::name.eq(name), sources::version.eq(version)))
            .get_result::<SourceRow>(&mut conn)
            .await?;
        Ok(row.into())
    }

    /// Cascade-deletes the source's documents and snippets.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let mut conn = self.pool.get().await?;
        diesel::delete(sources::table.find(id))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn bulk_delete(&self, ids: &[Uuid]) -> Result<u64> {
        let mut conn = self.pool.get().await?;
        let mut total = 0u64;
        for chunk in ids.chunks(100) {
            let deleted = diesel::delete(sources::table.filter(sources::id.eq_any(chunk)))
                .execute(&mut conn)
                .await?;
            total += deleted as u64;
        }
        Ok(total)
    }
}
