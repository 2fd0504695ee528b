//! `GET /search` and the `/documents/*` markdown routes.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::AppContext;
use crate::error::Result;
use crate::models::CodeSnippet;
use crate::repository::SearchFilters;
use crate::search::Pagination;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub snippets: Vec<CodeSnippet>,
    pub total: i64,
    pub page: u32,
    pub pages: u32,
}

/// Full-text snippet search, optionally scoped to one resolved source
/// (name or id) and/or one language, mirroring the MCP `get_content`
/// contract but without requiring a library to already be known.
pub async fn search(State(ctx): State<AppContext>, Query(query): Query<SearchQuery>) -> Result<Json<SearchResponse>> {
    let source_id = match &query.source {
        Some(s) if !s.trim().is_empty() => Some(ctx.repos.sources.resolve_library(s).await?.id),
        _ => None,
    };

    let pagination = Pagination::new(
        query.page,
        query.limit,
        ctx.config.search_default_max_results as u32,
        ctx.config.search_max_results as u32,
    );
    let filters = SearchFilters {
        source_id,
        language: query.language,
        limit: pagination.limit_i64(),
        offset: pagination.offset(),
    };
    let (snippets, total) = ctx.repos.snippets.search(&query.q, &filters).await?;

    Ok(Json(SearchResponse {
        snippets,
        total,
        page: pagination.page,
        pages: pagination.total_pages(total),
    }))
}

#[derive(Debug, Deserialize)]
pub struct PageMarkdownQuery {
    pub url: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub chunk_index: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PageMarkdownResponse {
    pub document_id: Uuid,
    pub source_id: Uuid,
    pub url: String,
    pub markdown: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// `GET /documents/markdown?url=...`: resolve a page by URL and return one
/// chunk of its stored markdown.
pub async fn page_markdown_by_query(
    State(ctx): State<AppContext>,
    Query(query): Query<PageMarkdownQuery>,
) -> Result<Json<PageMarkdownResponse>> {
    let chunk = ctx
        .search
        .get_page_markdown(&query.url, query.query.as_deref(), query.max_tokens, query.chunk_index)
        .await?;
    Ok(Json(PageMarkdownResponse {
        document_id: chunk.document.id,
        source_id: chunk.source.id,
        url: chunk.document.url,
        markdown: chunk.markdown_content,
        chunk_index: chunk.chunk_index,
        total_chunks: chunk.total_chunks,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PageMarkdownByIdQuery {
    #[serde(default)]
    pub max_tokens: Option<usize>,
    #[serde(default)]
    pub chunk_index: Option<usize>,
}

/// `GET /documents/{id}/markdown`: same chunking contract, keyed by
/// document id instead of URL.
pub async fn page_markdown_by_id(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
    Query(query): Query<PageMarkdownByIdQuery>,
) -> Result<Json<PageMarkdownResponse>> {
    let (document, markdown) = ctx.repos.documents.get_markdown(id).await?;
    let source = ctx.repos.sources.get(document.source_id).await?;
    let chunks = crate::search::chunk_markdown(
        &markdown,
        query.max_tokens.unwrap_or(2048),
        ctx.config.search_chars_per_token.max(1),
    );
    let chunk_index = query.chunk_index.unwrap_or(0);
    let content = chunks.get(chunk_index).cloned().ok_or_else(|| {
        crate::error::CodeDoxError::Validation(format!(
            "chunk_index {chunk_index} out of range (document has {} chunks)",
            chunks.len()
        ))
    })?;

    Ok(Json(PageMarkdownResponse {
        document_id: document.id,
        source_id: source.id,
        url: document.url,
        markdown: content,
        chunk_index,
        total_chunks: chunks.len(),
    }))
}
